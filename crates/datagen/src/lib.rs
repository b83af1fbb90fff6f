//! Deterministic synthetic marketing data — per-channel daily series with
//! seasonality, holidays, and diminishing returns baked in. Used by the CLI
//! demo and by engine tests that want realistic-looking input.

use chrono::{Datelike, NaiveDate, Weekday};
use mix_core::types::{Campaign, CampaignType, DailyChannelRecord, ExternalFactor};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Static behavior profile for one synthetic channel.
#[derive(Debug, Clone)]
pub struct ChannelProfile {
    pub name: &'static str,
    pub base_daily_budget: f64,
    /// Cost per mille for impression-buying channels.
    pub cpm: Option<f64>,
    /// Daily audience size for channels without a CPM (email sends).
    pub base_impressions: Option<f64>,
    pub ctr: f64,
    pub conversion_rate: f64,
    pub avg_order_value: f64,
    pub best_weekdays: &'static [Weekday],
    /// Daily spend beyond which conversion efficiency decays.
    pub diminishing_returns_point: Option<f64>,
    /// Commission-based channels spend a revenue share instead of a budget.
    pub commission_rate: Option<f64>,
    pub base_conversions: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedSeries {
    pub records: Vec<DailyChannelRecord>,
    pub factors: Vec<ExternalFactor>,
    pub campaigns: Vec<Campaign>,
}

pub struct DataGenerator {
    rng: StdRng,
    profiles: Vec<ChannelProfile>,
}

impl DataGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            profiles: default_profiles(),
        }
    }

    pub fn with_profiles(seed: u64, profiles: Vec<ChannelProfile>) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            profiles,
        }
    }

    /// Generate `days` consecutive days starting at `start`, one record per
    /// (date, channel) plus the matching external-factor rows.
    pub fn generate(&mut self, start: NaiveDate, days: u32) -> GeneratedSeries {
        let mut records = Vec::with_capacity(days as usize * self.profiles.len());
        let mut factors = Vec::with_capacity(days as usize);
        let profiles = self.profiles.clone();

        for offset in 0..days {
            let date = start + chrono::Duration::days(offset as i64);
            let seasonality = seasonality_index(date);
            let holiday = holiday_for(date);

            factors.push(ExternalFactor {
                date,
                is_holiday: holiday.is_some(),
                holiday_name: holiday.map(|(name, _)| name.to_string()),
                seasonality_index: seasonality,
            });

            for profile in &profiles {
                records.push(self.channel_day(date, profile, seasonality, holiday));
            }
        }

        let end = start + chrono::Duration::days(days.saturating_sub(1) as i64);
        let campaigns = profiles
            .iter()
            .map(|profile| Campaign {
                channel: profile.name.to_string(),
                campaign_name: format!("{} always-on", profile.name),
                start_date: start,
                end_date: end,
                budget: profile.base_daily_budget * days as f64,
                campaign_type: if profile.commission_rate.is_some() {
                    CampaignType::Retention
                } else if profile.best_weekdays.is_empty() {
                    CampaignType::Conversion
                } else {
                    CampaignType::Awareness
                },
            })
            .collect();

        GeneratedSeries {
            records,
            factors,
            campaigns,
        }
    }

    fn channel_day(
        &mut self,
        date: NaiveDate,
        profile: &ChannelProfile,
        seasonality: f64,
        holiday: Option<(&'static str, f64)>,
    ) -> DailyChannelRecord {
        let holiday_mult = holiday.map(|(_, m)| m).unwrap_or(1.0);
        let spend_mult = seasonality * holiday_mult;
        let mut spend =
            profile.base_daily_budget * spend_mult * (1.0 + self.rng.gen_range(-0.1..0.1));

        let impressions = if let Some(cpm) = profile.cpm {
            let effective_cpm = cpm * (1.0 + self.rng.gen_range(-0.2..0.2));
            (spend / effective_cpm * 1_000.0).max(0.0)
        } else {
            profile.base_impressions.unwrap_or(0.0) * (1.0 + self.rng.gen_range(-0.1..0.1))
        };

        let ctr = profile.ctr * (1.0 + self.rng.gen_range(-0.3..0.3));
        let clicks = impressions * ctr;

        // Conversion efficiency decays logarithmically past the
        // diminishing-returns point.
        let dr_factor = match profile.diminishing_returns_point {
            Some(point) if spend > point => 1.0 / (1.0 + (spend / point).ln()),
            _ => 1.0,
        };
        let mut effective_rate = profile.conversion_rate * dr_factor * seasonality;
        if profile.best_weekdays.contains(&date.weekday()) {
            effective_rate *= 1.2;
        }

        let order_value = profile.avg_order_value * (1.0 + self.rng.gen_range(-0.1..0.1));

        let (conversions, revenue) = if let Some(base) = profile.base_conversions {
            // Commission channels convert off brand strength, not clicks.
            let conversions =
                base * seasonality * holiday_mult * (1.0 + self.rng.gen_range(-0.2..0.2));
            (conversions.max(0.0), conversions.max(0.0) * order_value)
        } else {
            let conversions = clicks * effective_rate;
            (conversions, conversions * order_value)
        };

        if let Some(commission) = profile.commission_rate {
            spend = revenue * commission;
        }

        DailyChannelRecord {
            date,
            channel: profile.name.to_string(),
            spend,
            impressions: impressions.round().max(0.0) as u64,
            clicks: clicks.round().max(0.0) as u64,
            conversions: conversions.round().max(0.0) as u64,
            revenue,
        }
    }
}

/// Monthly seasonality times a day-of-week factor; 1.0 is a normal day.
pub fn seasonality_index(date: NaiveDate) -> f64 {
    let monthly = match date.month() {
        1 => 0.9,
        2 => 0.95,
        3 => 1.0,
        4 => 1.05,
        5 => 1.1,
        6 => 0.8,
        7 => 0.6,
        8 => 0.65,
        9 => 0.9,
        10 => 1.1,
        11 => 1.5,
        12 => 1.4,
        _ => 1.0,
    };
    let dow = match date.weekday() {
        Weekday::Mon => 0.9,
        Weekday::Tue => 0.95,
        Weekday::Wed => 1.0,
        Weekday::Thu => 1.1,
        Weekday::Fri => 1.15,
        Weekday::Sat => 1.05,
        Weekday::Sun => 0.85,
    };
    monthly * dow
}

/// Holiday name and revenue multiplier for a date, if any.
pub fn holiday_for(date: NaiveDate) -> Option<(&'static str, f64)> {
    // Floating retail holidays.
    if date.month() == 11 && date.weekday() == Weekday::Fri && (22..=28).contains(&date.day()) {
        return Some(("Black Friday", 3.0));
    }
    if date.month() == 11 && date.weekday() == Weekday::Mon && (25..=31).contains(&date.day()) {
        return Some(("Cyber Monday", 2.5));
    }

    match (date.month(), date.day()) {
        (12, 25) => Some(("Christmas", 1.8)),
        (1, 1) => Some(("New Year", 1.3)),
        (2, 14) => Some(("Valentine's Day", 1.5)),
        (7, 4) => Some(("July 4th", 1.3)),
        _ => None,
    }
}

pub fn default_profiles() -> Vec<ChannelProfile> {
    vec![
        ChannelProfile {
            name: "Google Ads",
            base_daily_budget: 5_000.0,
            cpm: Some(25.0),
            base_impressions: None,
            ctr: 0.02,
            conversion_rate: 0.022,
            avg_order_value: 85.0,
            best_weekdays: &[],
            diminishing_returns_point: Some(5_000.0),
            commission_rate: None,
            base_conversions: None,
        },
        ChannelProfile {
            name: "Meta Ads",
            base_daily_budget: 3_000.0,
            cpm: Some(18.0),
            base_impressions: None,
            ctr: 0.015,
            conversion_rate: 0.018,
            avg_order_value: 75.0,
            best_weekdays: &[Weekday::Thu, Weekday::Fri, Weekday::Sat],
            diminishing_returns_point: Some(4_000.0),
            commission_rate: None,
            base_conversions: None,
        },
        ChannelProfile {
            name: "Email",
            base_daily_budget: 300.0,
            cpm: None,
            base_impressions: Some(40_000.0),
            ctr: 0.025,
            conversion_rate: 0.045,
            avg_order_value: 95.0,
            best_weekdays: &[Weekday::Tue, Weekday::Thu],
            diminishing_returns_point: None,
            commission_rate: None,
            base_conversions: None,
        },
        ChannelProfile {
            name: "TikTok",
            base_daily_budget: 1_500.0,
            cpm: Some(10.0),
            base_impressions: None,
            ctr: 0.01,
            conversion_rate: 0.015,
            avg_order_value: 65.0,
            best_weekdays: &[],
            diminishing_returns_point: Some(2_500.0),
            commission_rate: None,
            base_conversions: None,
        },
        ChannelProfile {
            name: "Affiliate",
            base_daily_budget: 0.0,
            cpm: None,
            base_impressions: Some(10_000.0),
            ctr: 0.03,
            conversion_rate: 0.02,
            avg_order_value: 80.0,
            best_weekdays: &[],
            diminishing_returns_point: None,
            commission_rate: Some(0.08),
            base_conversions: Some(50.0),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    #[test]
    fn test_same_seed_reproduces_identical_series() {
        let a = DataGenerator::new(7).generate(start(), 30);
        let b = DataGenerator::new(7).generate(start(), 30);
        assert_eq!(a.records, b.records);
    }

    #[test]
    fn test_different_seeds_diverge() {
        let a = DataGenerator::new(7).generate(start(), 30);
        let b = DataGenerator::new(8).generate(start(), 30);
        assert_ne!(a.records, b.records);
    }

    #[test]
    fn test_one_record_per_date_and_channel() {
        let series = DataGenerator::new(7).generate(start(), 90);
        assert_eq!(series.records.len(), 90 * 5);
        assert_eq!(series.factors.len(), 90);
        assert_eq!(series.campaigns.len(), 5);
        assert!(series.campaigns.iter().all(|c| c.end_date >= c.start_date));

        let keys: BTreeSet<(NaiveDate, &str)> = series
            .records
            .iter()
            .map(|r| (r.date, r.channel.as_str()))
            .collect();
        assert_eq!(keys.len(), series.records.len());
    }

    #[test]
    fn test_spend_and_revenue_are_non_negative() {
        let series = DataGenerator::new(11).generate(start(), 365);
        for r in &series.records {
            assert!(r.spend >= 0.0, "{} spent {}", r.channel, r.spend);
            assert!(r.revenue >= 0.0, "{} earned {}", r.channel, r.revenue);
        }
    }

    #[test]
    fn test_christmas_lifts_spend_over_a_plain_weekday() {
        // 2024-12-25 and 2024-12-11 are both Wednesdays in the same month,
        // so the 1.8x holiday multiplier dominates the +-10% noise band.
        let series = DataGenerator::new(3).generate(NaiveDate::from_ymd_opt(2024, 12, 1).unwrap(), 31);
        let spend_on = |day: u32| {
            series
                .records
                .iter()
                .find(|r| r.channel == "Google Ads" && r.date.day() == day)
                .map(|r| r.spend)
                .unwrap()
        };
        assert!(spend_on(25) > spend_on(11) * 1.4);
    }

    #[test]
    fn test_holiday_calendar() {
        assert!(holiday_for(NaiveDate::from_ymd_opt(2024, 12, 25).unwrap()).is_some());
        assert!(holiday_for(NaiveDate::from_ymd_opt(2024, 3, 13).unwrap()).is_none());
        // Black Friday 2024 falls on November 29th.
        let (name, mult) = holiday_for(NaiveDate::from_ymd_opt(2024, 11, 29).unwrap()).unwrap();
        assert_eq!(name, "Black Friday");
        assert!((mult - 3.0).abs() < f64::EPSILON);
        // Cyber Monday 2024 is December 2nd, outside the November window —
        // the generator only marks November Mondays after the 24th.
        assert!(holiday_for(NaiveDate::from_ymd_opt(2024, 11, 25).unwrap()).is_some());
    }

    #[test]
    fn test_affiliate_spend_tracks_commission() {
        let series = DataGenerator::new(5).generate(start(), 30);
        for r in series.records.iter().filter(|r| r.channel == "Affiliate") {
            assert!((r.spend - r.revenue * 0.08).abs() < 1e-9);
        }
    }
}

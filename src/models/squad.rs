//! Squad roster and the category reports derived from it.
//!
//! Finance, transfer activity, TSI, wages and coach all come out of one
//! roster fetch; the derivations here keep that fetch from running five
//! times per club.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Full roster response: players, trainer and recent transfer activity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Squad {
    pub players: Vec<Player>,
    pub coach: Option<super::CoachReport>,
    pub transfers: TransferActivity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: i64,
    pub name: String,
    pub age: Option<u32>,
    pub tsi: i64,
    pub weekly_wage: i64,
    /// `None` when healthy; `Some(weeks)` when injured (0 = bruised).
    pub injury_weeks: Option<u32>,
    pub transfer_listed: bool,
}

/// Buy/sell counters plus the transfer records behind them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransferActivity {
    pub bought: u32,
    pub sold: u32,
    pub records: Vec<TransferRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferKind {
    Buy,
    Sell,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferRecord {
    pub transfer_id: Option<i64>,
    pub kind: TransferKind,
    pub player_name: String,
    pub deadline: Option<DateTime<Utc>>,
    pub price: i64,
}

impl TransferRecord {
    /// Identity for diffing: the explicit transfer id when the API sent
    /// one, otherwise a composite of kind, player, deadline and price.
    pub fn synthetic_key(&self) -> String {
        if let Some(id) = self.transfer_id {
            return format!("id:{}", id);
        }
        let kind = match self.kind {
            TransferKind::Buy => "buy",
            TransferKind::Sell => "sell",
        };
        let deadline = self
            .deadline
            .map(|d| d.timestamp().to_string())
            .unwrap_or_default();
        format!("{}:{}:{}:{}", kind, self.player_name, deadline, self.price)
    }
}

/// Weekly cost picture estimated from the roster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinanceEstimate {
    pub weekly_wages: i64,
    pub transfer_spend: i64,
    pub transfer_income: i64,
}

/// Total squad TSI plus per-player condition, keyed by player id so
/// injury changes can be diffed as a set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TsiReport {
    pub total: i64,
    pub players: BTreeMap<i64, PlayerCondition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerCondition {
    pub name: String,
    pub tsi: i64,
    pub injury_weeks: Option<u32>,
}

/// Wage bill summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WageReport {
    pub total_weekly: i64,
    pub highest_wage: i64,
    pub highest_paid: Option<String>,
}

impl Squad {
    pub fn finance_estimate(&self) -> FinanceEstimate {
        let weekly_wages = self.players.iter().map(|p| p.weekly_wage).sum();
        let mut transfer_spend = 0;
        let mut transfer_income = 0;
        for record in &self.transfers.records {
            match record.kind {
                TransferKind::Buy => transfer_spend += record.price,
                TransferKind::Sell => transfer_income += record.price,
            }
        }
        FinanceEstimate {
            weekly_wages,
            transfer_spend,
            transfer_income,
        }
    }

    pub fn tsi_report(&self) -> TsiReport {
        let players = self
            .players
            .iter()
            .map(|p| {
                (
                    p.id,
                    PlayerCondition {
                        name: p.name.clone(),
                        tsi: p.tsi,
                        injury_weeks: p.injury_weeks,
                    },
                )
            })
            .collect();
        TsiReport {
            total: self.players.iter().map(|p| p.tsi).sum(),
            players,
        }
    }

    pub fn wage_report(&self) -> WageReport {
        let highest = self.players.iter().max_by_key(|p| p.weekly_wage);
        WageReport {
            total_weekly: self.players.iter().map(|p| p.weekly_wage).sum(),
            highest_wage: highest.map(|p| p.weekly_wage).unwrap_or(0),
            highest_paid: highest.map(|p| p.name.clone()),
        }
    }

    /// Transfer activity with the record list capped to `depth` entries.
    pub fn transfer_activity(&self, depth: usize) -> TransferActivity {
        let mut activity = self.transfers.clone();
        activity.records.truncate(depth);
        activity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(id: i64, name: &str, tsi: i64, wage: i64) -> Player {
        Player {
            id,
            name: name.to_string(),
            age: Some(24),
            tsi,
            weekly_wage: wage,
            injury_weeks: None,
            transfer_listed: false,
        }
    }

    fn squad() -> Squad {
        Squad {
            players: vec![player(1, "Ek", 1200, 500), player(2, "Berg", 3400, 900)],
            coach: None,
            transfers: TransferActivity {
                bought: 1,
                sold: 1,
                records: vec![
                    TransferRecord {
                        transfer_id: Some(77),
                        kind: TransferKind::Buy,
                        player_name: "Nyman".to_string(),
                        deadline: None,
                        price: 150_000,
                    },
                    TransferRecord {
                        transfer_id: None,
                        kind: TransferKind::Sell,
                        player_name: "Lund".to_string(),
                        deadline: None,
                        price: 90_000,
                    },
                ],
            },
        }
    }

    #[test]
    fn finance_estimate_sums_wages_and_transfers() {
        let estimate = squad().finance_estimate();
        assert_eq!(estimate.weekly_wages, 1400);
        assert_eq!(estimate.transfer_spend, 150_000);
        assert_eq!(estimate.transfer_income, 90_000);
    }

    #[test]
    fn tsi_report_totals_and_keys_by_player_id() {
        let report = squad().tsi_report();
        assert_eq!(report.total, 4600);
        assert_eq!(report.players.get(&2).map(|p| p.tsi), Some(3400));
    }

    #[test]
    fn wage_report_finds_highest_paid() {
        let report = squad().wage_report();
        assert_eq!(report.total_weekly, 1400);
        assert_eq!(report.highest_paid.as_deref(), Some("Berg"));
    }

    #[test]
    fn synthetic_key_prefers_explicit_id() {
        let squad = squad();
        assert_eq!(squad.transfers.records[0].synthetic_key(), "id:77");
        assert_eq!(squad.transfers.records[1].synthetic_key(), "sell:Lund::90000");
    }
}

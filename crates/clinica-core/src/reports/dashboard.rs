//! Home screen counters.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{parse_day, ReportResult};
use crate::db::Database;

/// Load of one active queue.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueueLoad {
    pub queue_id: i64,
    pub queue_name: String,
    pub specialty_id: i64,
    pub waiting: usize,
    pub in_attendance: usize,
}

/// Counters shown on the home screen.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DashboardSummary {
    /// Day the "today" counters refer to (YYYY-MM-DD)
    pub day: String,
    pub total_patients: i64,
    /// Memberships still waiting, across open flows
    pub waiting: usize,
    /// Open attendances
    pub in_attendance: usize,
    pub attended_today: i64,
    pub triages_today: i64,
    pub queues: Vec<QueueLoad>,
}

impl DashboardSummary {
    /// Collect the counters for `day`.
    pub fn collect(db: &Database, day: &str) -> ReportResult<Self> {
        let day = parse_day(day)?.format("%Y-%m-%d").to_string();

        let mut queues: BTreeMap<i64, QueueLoad> = db
            .list_queues(true)?
            .into_iter()
            .map(|q| {
                (
                    q.id,
                    QueueLoad {
                        queue_id: q.id,
                        queue_name: q.name,
                        specialty_id: q.specialty_id,
                        waiting: 0,
                        in_attendance: 0,
                    },
                )
            })
            .collect();

        let mut waiting = 0;
        let mut in_attendance = 0;
        for flow in db.list_open_flows()? {
            for membership in flow.waiting() {
                let attending = flow.in_attendance == Some(membership.id);
                if attending {
                    in_attendance += 1;
                } else {
                    waiting += 1;
                }
                // Deactivated queues keep their patients but leave the board
                if let Some(load) = queues.get_mut(&membership.queue_id) {
                    if attending {
                        load.in_attendance += 1;
                    } else {
                        load.waiting += 1;
                    }
                }
            }
        }

        Ok(Self {
            total_patients: db.count_patients()?,
            waiting,
            in_attendance,
            attended_today: db.count_attended_on(&day)?,
            triages_today: db.count_triages_on(&day)?,
            queues: queues.into_values().collect(),
            day,
        })
    }

    /// Queues ordered by how many patients are waiting, busiest first.
    pub fn busiest_queues(&self) -> Vec<&QueueLoad> {
        let mut loads: Vec<&QueueLoad> = self.queues.iter().collect();
        loads.sort_by(|a, b| b.waiting.cmp(&a.waiting).then(a.queue_id.cmp(&b.queue_id)));
        loads
    }
}

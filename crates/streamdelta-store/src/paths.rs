//! Store path layout.
//!
//! ```text
//! playlist-data/<tenant>/urls.txt        source list
//! playlist-data/<tenant>/schedule.json   per-tenant trigger state
//! scraper-schedule.json                  legacy global trigger state
//! data/<tenant>/<YYYY-MM-DD>.json        daily snapshot
//! ```

use chrono::NaiveDate;
use streamdelta_core::TenantId;

pub const TENANTS_ROOT: &str = "playlist-data";
pub const SNAPSHOTS_ROOT: &str = "data";
pub const GLOBAL_SCHEDULE_PATH: &str = "scraper-schedule.json";

#[must_use]
pub fn sources_path(tenant: &TenantId) -> String {
    format!("{TENANTS_ROOT}/{tenant}/urls.txt")
}

#[must_use]
pub fn schedule_path(tenant: &TenantId) -> String {
    format!("{TENANTS_ROOT}/{tenant}/schedule.json")
}

#[must_use]
pub fn snapshot_path(tenant: &TenantId, date: NaiveDate) -> String {
    format!("{SNAPSHOTS_ROOT}/{tenant}/{}.json", date.format("%Y-%m-%d"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_matches_repository_convention() {
        let tenant = TenantId::parse("-1001").unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 3, 7).unwrap();
        assert_eq!(sources_path(&tenant), "playlist-data/-1001/urls.txt");
        assert_eq!(schedule_path(&tenant), "playlist-data/-1001/schedule.json");
        assert_eq!(snapshot_path(&tenant, date), "data/-1001/2025-03-07.json");
    }
}

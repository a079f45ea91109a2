use serde::{Deserialize, Serialize};

/// Dashboard statistics pushed by the reporting subsystem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub ticket_count: u64,
    pub today_revenue: f64,
    pub active_ferries: u64,
    pub active_branches: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_pushed_snapshot() {
        // テスト項目: サーバーが送る JSON をスナップショットとして読み取れる
        // given (前提条件):
        let frame = r#"{"ticket_count":42,"today_revenue":12500.5,"active_ferries":3,"active_branches":2}"#;

        // when (操作):
        let stats: DashboardStats = serde_json::from_str(frame).unwrap();

        // then (期待する結果):
        assert_eq!(
            stats,
            DashboardStats {
                ticket_count: 42,
                today_revenue: 12500.5,
                active_ferries: 3,
                active_branches: 2,
            }
        );
    }

    #[test]
    fn test_incomplete_snapshot_is_rejected() {
        // テスト項目: 項目が欠けた JSON はスナップショットとして扱わない
        // given (前提条件):
        let frame = r#"{"ticket_count":42}"#;

        // when (操作):
        let result = serde_json::from_str::<DashboardStats>(frame);

        // then (期待する結果):
        assert!(result.is_err());
    }
}

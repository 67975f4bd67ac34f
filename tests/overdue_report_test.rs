// ==========================================
// 超期报告与巡检集成测试
// ==========================================
// 覆盖: 参考时间选择、严格阈值、只读幂等、配置阈值、巡检审计与计数
// ==========================================


#[cfg(test)]
mod overdue_report_test {
    use chrono::Duration;
    use msds_workflow::config::{config_keys, SlaThresholds, DEFAULT_SLA_HOURS, MAX_SLA_HOURS};
    use msds_workflow::domain::{ActionType, ReviewTeam, WorkflowState};

    use crate::test_helpers::{base_time, sample_key, setup_app};

    #[test]
    fn test_reference_time_per_state() {
        let (_tmp, app, clock) = setup_app();
        let api = &app.workflow_api;

        // ORIGIN: 计时起点 created_at = t0
        let origin = api.initiate(sample_key("O-01"), "origin.alice").unwrap();

        // PLANT: created_at = t0, extended_at = t0+10h
        let plant = api.initiate(sample_key("O-02"), "origin.alice").unwrap();
        clock.advance(Duration::hours(10));
        api.extend_to_plant(&plant, "plant.bob").unwrap();

        // REVIEW_A: 进入评审时刻 t0+12h
        let review = api.initiate(sample_key("O-03"), "origin.alice").unwrap();
        api.extend_to_plant(&review, "plant.bob").unwrap();
        clock.advance(Duration::hours(2));
        api.raise_query_and_move_to_review(&review, ReviewTeam::A, "闪点数据?", "plant.bob")
            .unwrap();

        let thresholds = SlaThresholds::uniform(24);

        // t0+30h: ORIGIN 已 30h，PLANT 20h，REVIEW 18h
        clock.set(base_time() + Duration::hours(30));
        let report = api.get_overdue_report(&thresholds).unwrap();
        assert_eq!(report.len(), 1);
        assert_eq!(report[0].workflow_id, origin);
        assert_eq!(report[0].state, WorkflowState::OriginPending);
        assert_eq!(report[0].reference_time, base_time());
        assert_eq!(report[0].overdue_by_seconds, 6 * 3600);

        // t0+36h+1s: 三者全部超期
        clock.set(base_time() + Duration::hours(36) + Duration::seconds(1));
        let report = api.get_overdue_report(&thresholds).unwrap();
        let ids: Vec<&str> = report.iter().map(|e| e.workflow_id.as_str()).collect();
        assert_eq!(ids.len(), 3);
        assert!(ids.windows(2).all(|w| w[0] < w[1]));

        let plant_entry = report.iter().find(|e| e.workflow_id == plant).unwrap();
        assert_eq!(plant_entry.reference_time, base_time() + Duration::hours(10));
        let review_entry = report.iter().find(|e| e.workflow_id == review).unwrap();
        assert_eq!(review_entry.state, WorkflowState::ReviewAPending);
        assert_eq!(review_entry.reference_time, base_time() + Duration::hours(12));
        assert_eq!(review_entry.overdue_by_seconds, 1);
    }

    #[test]
    fn test_threshold_boundary_is_strict() {
        let (_tmp, app, clock) = setup_app();
        let api = &app.workflow_api;
        api.initiate(sample_key("O-10"), "origin.alice").unwrap();

        let thresholds = SlaThresholds::default();
        clock.set(base_time() + Duration::hours(72));
        assert!(api.get_overdue_report(&thresholds).unwrap().is_empty());

        clock.advance(Duration::seconds(1));
        assert_eq!(api.get_overdue_report(&thresholds).unwrap().len(), 1);
    }

    #[test]
    fn test_report_rejects_out_of_range_thresholds() {
        let (_tmp, app, clock) = setup_app();
        let api = &app.workflow_api;
        api.initiate(sample_key("O-15"), "origin.alice").unwrap();
        clock.advance(Duration::days(5));

        for thresholds in [
            SlaThresholds::uniform(0),
            SlaThresholds::uniform(-24),
            SlaThresholds {
                plant_pending_hours: 9_000_000_000_000,
                ..SlaThresholds::default()
            },
        ] {
            let err = api.get_overdue_report(&thresholds).unwrap_err();
            assert_eq!(err.code(), "INVALID_INPUT");
        }

        let max = SlaThresholds::uniform(MAX_SLA_HOURS);
        assert!(api.get_overdue_report(&max).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sweeper_ignores_oversized_configured_threshold() {
        let (_tmp, app, clock) = setup_app();
        let api = app.workflow_api.clone();
        let id = api.initiate(sample_key("O-16"), "origin.alice").unwrap();

        app.config_manager
            .set_config_value(config_keys::SLA_ORIGIN_PENDING_HOURS, "9000000000000")
            .unwrap();

        // 超限配置回退到默认 72h
        clock.advance(Duration::hours(73));
        let report = app.sweeper.sweep_once().await.unwrap();
        assert_eq!(report.overdue_ids(), vec![id.as_str()]);
        assert_eq!(report.entries[0].threshold_seconds, DEFAULT_SLA_HOURS * 3600);
    }

    #[test]
    fn test_report_is_idempotent_and_read_only() {
        let (_tmp, app, clock) = setup_app();
        let api = &app.workflow_api;

        let id = api.initiate(sample_key("O-20"), "origin.alice").unwrap();
        api.extend_to_plant(&id, "plant.bob").unwrap();
        let done = api.initiate(sample_key("O-21"), "origin.alice").unwrap();
        api.extend_to_plant(&done, "plant.bob").unwrap();
        api.complete(&done, "plant.bob").unwrap();

        let before = api.get_workflow(&id).unwrap();
        let trail_before = api.list_audit_trail(&id).unwrap().len();

        clock.advance(Duration::days(10));
        let thresholds = SlaThresholds::uniform(1);
        let first = api.get_overdue_report(&thresholds).unwrap();
        let second = api.get_overdue_report(&thresholds).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.len(), 1, "终态流程不参与评估");
        assert_eq!(first[0].workflow_id, id);

        let after = api.get_workflow(&id).unwrap();
        assert_eq!(after.revision, before.revision);
        assert_eq!(after.last_modified_at, before.last_modified_at);
        assert_eq!(api.list_audit_trail(&id).unwrap().len(), trail_before);
    }

    #[tokio::test]
    async fn test_sweeper_uses_configured_thresholds() {
        let (_tmp, app, clock) = setup_app();
        let api = app.workflow_api.clone();

        let origin = api.initiate(sample_key("O-30"), "origin.alice").unwrap();
        let plant = api.initiate(sample_key("O-31"), "origin.alice").unwrap();
        api.extend_to_plant(&plant, "plant.bob").unwrap();

        app.config_manager
            .set_config_value(config_keys::SLA_ORIGIN_PENDING_HOURS, "2")
            .unwrap();

        clock.advance(Duration::hours(3));
        let report = app.sweeper.sweep_once().await.unwrap();

        // PLANT 仍使用默认 72h
        assert_eq!(report.scanned, 2);
        assert_eq!(report.overdue_ids(), vec![origin.as_str()]);
        assert_eq!(report.entries[0].threshold_seconds, 2 * 3600);
        assert_eq!(report.evaluated_at, base_time() + Duration::hours(3));
    }

    #[tokio::test]
    async fn test_sweeper_audits_overdue_without_mutating() {
        let (_tmp, app, clock) = setup_app();
        let api = app.workflow_api.clone();

        let id = api.initiate(sample_key("O-40"), "origin.alice").unwrap();
        let before = api.get_workflow(&id).unwrap();

        clock.advance(Duration::days(4));
        let first = app.sweeper.sweep_once().await.unwrap();
        let second = app.sweeper.sweep_once().await.unwrap();
        assert_eq!(first.entries, second.entries);

        let after = api.get_workflow(&id).unwrap();
        assert_eq!(after.state, WorkflowState::OriginPending);
        assert_eq!(after.revision, before.revision);

        let overdue_rows: Vec<_> = api
            .list_audit_trail(&id)
            .unwrap()
            .into_iter()
            .filter(|log| log.action_type == ActionType::Overdue.as_str())
            .collect();
        assert_eq!(overdue_rows.len(), 2);
        assert_eq!(overdue_rows[0].actor, "system");
        assert_eq!(overdue_rows[0].payload_json.as_ref().unwrap()["state"], "ORIGIN_PENDING");

        assert_eq!(app.metrics.snapshot().overdue_flags, 2);
    }
}

// ==========================================
// 审批流程端到端场景测试
// ==========================================
// 职责: 通过 WorkflowApi 验证单团队/双团队问询场景与不变式
// ==========================================


#[cfg(test)]
mod workflow_scenario_test {
    use chrono::Duration;
    use msds_workflow::api::{ApiErrorBody, WorkflowApi};
    use msds_workflow::app::AppState;
    use msds_workflow::domain::{
        ActionType, QueryPriority, QueryStatus, ReviewTeam, Workflow, WorkflowState,
    };
    use msds_workflow::engine::{HookResult, NotificationHook, WorkflowError, WorkflowMetricsHook};
    use std::sync::Arc;

    use crate::test_helpers::{count_open_queries, sample_key, setup_app, setup_engine};

    /// 不变式检查: 完成态无 OPEN 问询；评审态有对应团队的 OPEN 问询
    fn assert_invariants(api: &WorkflowApi, workflow_id: &str) {
        let wf = api.get_workflow(workflow_id).unwrap();
        let open_teams = api.open_queries_by_team(workflow_id).unwrap();
        match wf.state {
            WorkflowState::Completed => {
                assert!(wf.completed_at.is_some());
                assert!(open_teams.is_empty());
            }
            state => {
                if let Some(team) = state.review_team() {
                    assert!(open_teams.contains(&team), "{} 缺少 OPEN 问询", state);
                }
            }
        }
    }

    fn plant_pending(app: &AppState, block: &str) -> String {
        let api = &app.workflow_api;
        let id = api.initiate(sample_key(block), "origin.alice").unwrap();
        api.extend_to_plant(&id, "plant.bob").unwrap();
        id
    }

    // ==========================================
    // 单团队场景
    // ==========================================

    #[test]
    fn test_single_team_scenario() {
        let (_tmp, app, clock) = setup_app();
        let api = &app.workflow_api;

        let id = api.initiate(sample_key("B-01"), "origin.alice").unwrap();
        assert_eq!(api.get_workflow(&id).unwrap().state, WorkflowState::OriginPending);

        clock.advance(Duration::hours(1));
        let wf = api.extend_to_plant(&id, "plant.bob").unwrap();
        assert_eq!(wf.state, WorkflowState::PlantPending);
        assert!(wf.extended_at.is_some());

        let wf = api
            .raise_query_and_move_to_review(&id, ReviewTeam::A, "请补充 GHS 分类依据", "plant.bob")
            .unwrap();
        assert_eq!(wf.state, WorkflowState::ReviewAPending);
        assert_eq!(api.list_queries(&id).unwrap().len(), 1);
        assert_invariants(api, &id);

        let before = api.get_workflow(&id).unwrap();
        let err = api.complete(&id, "plant.bob").unwrap_err();
        assert!(matches!(err, WorkflowError::WorkflowBlocked { .. }));
        assert_eq!(api.get_workflow(&id).unwrap(), before);

        let query_id = api.list_queries(&id).unwrap()[0].query_id.clone();
        clock.advance(Duration::hours(5));
        let wf = api.resolve_query(&query_id, "已按 GB 30000 补充", "chem.carol").unwrap();
        assert_eq!(wf.state, WorkflowState::PlantPending);
        assert_invariants(api, &id);

        clock.advance(Duration::hours(1));
        let wf = api.complete(&id, "plant.bob").unwrap();
        assert_eq!(wf.state, WorkflowState::Completed);
        assert!(wf.completed_at.is_some());
        assert_invariants(api, &id);
    }

    // ==========================================
    // 双团队场景
    // ==========================================

    #[test]
    fn test_two_team_scenario_resolve_a_then_b() {
        let (_tmp, app, _) = setup_app();
        let api = &app.workflow_api;
        let id = plant_pending(&app, "B-02");

        let (_, qa) = api
            .raise_query_with_priority(&id, ReviewTeam::A, "成分表?", QueryPriority::High, "plant.bob")
            .unwrap();
        let (wf, qb) = api
            .raise_query_with_priority(&id, ReviewTeam::B, "包装规格?", QueryPriority::Normal, "plant.bob")
            .unwrap();
        // 最近进入的评审态生效
        assert_eq!(wf.state, WorkflowState::ReviewBPending);
        assert_invariants(api, &id);

        let wf = api.resolve_query(&qa.query_id, "见附件", "chem.carol").unwrap();
        assert_eq!(wf.state, WorkflowState::ReviewBPending);
        assert_invariants(api, &id);
        assert!(matches!(
            api.complete(&id, "plant.bob").unwrap_err(),
            WorkflowError::WorkflowBlocked { .. }
        ));

        let wf = api.resolve_query(&qb.query_id, "25kg 桶装", "tech.dave").unwrap();
        assert_eq!(wf.state, WorkflowState::PlantPending);
        assert_invariants(api, &id);

        api.complete(&id, "plant.bob").unwrap();
        assert_invariants(api, &id);
    }

    #[test]
    fn test_two_team_scenario_resolve_b_then_a() {
        let (_tmp, app, _) = setup_app();
        let api = &app.workflow_api;
        let id = plant_pending(&app, "B-03");

        let (_, qa) = api
            .raise_query_with_priority(&id, ReviewTeam::A, "成分表?", QueryPriority::High, "plant.bob")
            .unwrap();
        let (_, qb) = api
            .raise_query_with_priority(&id, ReviewTeam::B, "包装规格?", QueryPriority::Normal, "plant.bob")
            .unwrap();

        // 当前团队问询清空但另一团队仍有问询: 切换到仍持有问询的团队
        let wf = api.resolve_query(&qb.query_id, "25kg 桶装", "tech.dave").unwrap();
        assert_eq!(wf.state, WorkflowState::ReviewAPending);
        assert_invariants(api, &id);

        let wf = api.resolve_query(&qa.query_id, "见附件", "chem.carol").unwrap();
        assert_eq!(wf.state, WorkflowState::PlantPending);
        assert_invariants(api, &id);
        assert_eq!(count_open_queries(&app.db_path, &id), 0);
    }

    #[test]
    fn test_non_last_resolution_keeps_state() {
        let (_tmp, app, _) = setup_app();
        let api = &app.workflow_api;
        let id = plant_pending(&app, "B-04");

        let (_, q1) = api
            .raise_query_with_priority(&id, ReviewTeam::A, "闪点?", QueryPriority::Normal, "plant.bob")
            .unwrap();
        let (wf, _q2) = api
            .raise_query_with_priority(&id, ReviewTeam::A, "沸点?", QueryPriority::Normal, "plant.bob")
            .unwrap();
        assert_eq!(wf.state, WorkflowState::ReviewAPending);

        let wf = api.resolve_query(&q1.query_id, "-20℃", "chem.carol").unwrap();
        assert_eq!(wf.state, WorkflowState::ReviewAPending);
        assert!(api.has_open_queries(&id).unwrap());
    }

    // ==========================================
    // 错误路径
    // ==========================================

    #[test]
    fn test_duplicate_initiate_creates_nothing() {
        let (_tmp, app, _) = setup_app();
        let api = &app.workflow_api;
        let id = api.initiate(sample_key("B-05"), "origin.alice").unwrap();

        let err = api.initiate(sample_key("B-05"), "origin.eve").unwrap_err();
        assert_eq!(ApiErrorBody::from(&err).code, "DUPLICATE_RECORD");

        let existing = api.find_by_natural_key(&sample_key("B-05")).unwrap().unwrap();
        assert_eq!(existing.workflow_id, id);
        assert_eq!(existing.initiated_by, "origin.alice");
    }

    #[test]
    fn test_resolved_query_cannot_change() {
        let (_tmp, app, clock) = setup_app();
        let api = &app.workflow_api;
        let id = plant_pending(&app, "B-06");
        let (_, q) = api
            .raise_query_with_priority(&id, ReviewTeam::B, "运输类别?", QueryPriority::Low, "plant.bob")
            .unwrap();

        api.resolve_query(&q.query_id, "UN1090", "tech.dave").unwrap();
        let resolved = api.list_queries(&id).unwrap().remove(0);

        clock.advance(Duration::hours(2));
        assert!(matches!(
            api.resolve_query(&q.query_id, "改答复", "tech.frank").unwrap_err(),
            WorkflowError::QueryAlreadyResolved { .. }
        ));
        assert!(matches!(
            api.reassign_query(&q.query_id, ReviewTeam::A, "lead").unwrap_err(),
            WorkflowError::QueryAlreadyResolved { .. }
        ));

        let after = api.list_queries(&id).unwrap().remove(0);
        assert_eq!(after.status, QueryStatus::Resolved);
        assert_eq!(after.resolved_at, resolved.resolved_at);
        assert_eq!(after.resolved_by, resolved.resolved_by);
    }

    #[test]
    fn test_completed_workflow_rejects_everything() {
        let (_tmp, app, _) = setup_app();
        let api = &app.workflow_api;
        let id = plant_pending(&app, "B-07");
        api.complete(&id, "plant.bob").unwrap();

        let errors = vec![
            api.complete(&id, "plant.bob").unwrap_err(),
            api.extend_to_plant(&id, "plant.bob").unwrap_err(),
            api.raise_query_and_move_to_review(&id, ReviewTeam::A, "?", "plant.bob")
                .unwrap_err(),
            api.move_to_review(&id, ReviewTeam::B, "plant.bob").unwrap_err(),
        ];
        for err in errors {
            assert!(matches!(err, WorkflowError::WorkflowTerminal { .. }), "{err:?}");
        }
        assert!(api.list_queries(&id).unwrap().is_empty());
    }

    #[test]
    fn test_raise_before_plant_is_invalid_state() {
        let (_tmp, app, _) = setup_app();
        let api = &app.workflow_api;
        let id = api.initiate(sample_key("B-08"), "origin.alice").unwrap();

        let err = api
            .raise_query_and_move_to_review(&id, ReviewTeam::A, "?", "plant.bob")
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_WORKFLOW_STATE");
        assert_eq!(api.get_workflow(&id).unwrap().state, WorkflowState::OriginPending);
    }

    // ==========================================
    // 改派与审计
    // ==========================================

    #[test]
    fn test_reassign_realigns_review_state() {
        let (_tmp, app, _) = setup_app();
        let api = &app.workflow_api;
        let id = plant_pending(&app, "B-09");
        let (_, q) = api
            .raise_query_with_priority(&id, ReviewTeam::A, "毒理终点?", QueryPriority::Urgent, "plant.bob")
            .unwrap();

        let wf = api.reassign_query(&q.query_id, ReviewTeam::B, "lead.gina").unwrap();
        assert_eq!(wf.state, WorkflowState::ReviewBPending);
        assert_invariants(api, &id);

        let detail = api.get_workflow_detail(&id).unwrap();
        assert_eq!(detail.queries[0].assigned_team, ReviewTeam::B);
        assert!(detail.allowed_targets.is_empty());
    }

    #[test]
    fn test_audit_trail_records_every_step() {
        let (_tmp, app, _) = setup_app();
        let api = &app.workflow_api;
        let id = plant_pending(&app, "B-10");
        let (_, q) = api
            .raise_query_with_priority(&id, ReviewTeam::A, "成分?", QueryPriority::Normal, "plant.bob")
            .unwrap();
        api.resolve_query(&q.query_id, "ok", "chem.carol").unwrap();
        api.complete(&id, "plant.bob").unwrap();

        let kinds: Vec<String> = api
            .list_audit_trail(&id)
            .unwrap()
            .into_iter()
            .map(|log| log.action_type)
            .collect();
        let expected: Vec<String> = [
            ActionType::WorkflowCreated,
            ActionType::StateChanged, // → PLANT_PENDING
            ActionType::QueryRaised,
            ActionType::StateChanged, // → REVIEW_A_PENDING
            ActionType::QueryResolved,
            ActionType::StateChanged, // → PLANT_PENDING
            ActionType::StateChanged, // → COMPLETED
        ]
        .iter()
        .map(|t| t.as_str().to_string())
        .collect();
        assert_eq!(kinds, expected);

        let snap = app.metrics.snapshot();
        assert_eq!(snap.workflows_created, 1);
        assert_eq!(snap.workflows_completed, 1);
        assert_eq!(snap.queries_resolved, 1);
    }

    // ==========================================
    // Hook 失败不回滚
    // ==========================================

    struct BrokenMailer;

    impl NotificationHook for BrokenMailer {
        fn name(&self) -> &str {
            "mailer"
        }

        fn on_state_changed(&self, _wf: &Workflow, _from: WorkflowState, _actor: &str) -> HookResult {
            Err("SMTP 连接超时".into())
        }
    }

    #[test]
    fn test_hook_failure_does_not_undo_transition() {
        let metrics = Arc::new(WorkflowMetricsHook::new());
        let fx = setup_engine(vec![Arc::new(BrokenMailer), metrics.clone()]);

        let wf = fx
            .state_machine
            .initiate(sample_key("B-11"), "origin.alice")
            .unwrap();
        let moved = fx
            .state_machine
            .extend_to_plant(&wf.workflow_id, "plant.bob")
            .unwrap();
        assert_eq!(moved.state, WorkflowState::PlantPending);

        let stored = fx.repo.find_by_id(&wf.workflow_id).unwrap().unwrap();
        assert_eq!(stored.state, WorkflowState::PlantPending);
        assert_eq!(metrics.snapshot().state_changes, 1);
    }

    // ==========================================
    // 持久化
    // ==========================================

    #[test]
    fn test_state_survives_reopen() {
        let (tmp, app, _) = setup_app();
        let id = plant_pending(&app, "B-12");
        app.workflow_api
            .raise_query_and_move_to_review(&id, ReviewTeam::B, "储存条件?", "plant.bob")
            .unwrap();
        let db_path = app.db_path.clone();
        drop(app);

        let reopened = AppState::new(db_path).unwrap();
        let wf = reopened.workflow_api.get_workflow(&id).unwrap();
        assert_eq!(wf.state, WorkflowState::ReviewBPending);
        assert_eq!(wf.revision, 2);
        assert_eq!(reopened.workflow_api.list_queries(&id).unwrap().len(), 1);
        drop(tmp);
    }
}

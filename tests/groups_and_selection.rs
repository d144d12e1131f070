use tool_sync_lib::{
    Catalog, CatalogSnapshots, EnablementRecord, GroupService, McpEnablementStore, McpSet,
    McpSetItem, RuleSummary, SelectionService, ToolCategory, ToolRegistry, ToolSelection, ToolSyncStatus,
    GROUP_ALL, GROUP_CLI,
};

#[path = "support.rs"]
mod support;
use support::{create_test_state, sample_tools, tool};

fn rule(id: &str) -> RuleSummary {
    RuleSummary {
        id: id.to_string(),
        name: id.to_string(),
        content: format!("# {id}"),
        is_active: false,
    }
}

fn mcp_set(id: &str, servers: &[(&str, bool)]) -> McpSet {
    McpSet {
        id: id.to_string(),
        name: id.to_string(),
        items: servers
            .iter()
            .map(|(server, disabled)| McpSetItem {
                server_id: server.to_string(),
                disabled: *disabled,
            })
            .collect(),
    }
}

fn ids(values: &[&str]) -> ToolSelection {
    ToolSelection::Ids(values.iter().map(|v| v.to_string()).collect())
}

#[test]
fn builtin_groups_follow_installed_catalog() {
    let state = create_test_state(sample_tools()).expect("create test state");

    let groups = GroupService::list(&state).expect("list groups");

    let all = groups.iter().find(|g| g.id == GROUP_ALL).expect("all group");
    assert_eq!(all.member_tool_ids, vec!["t1", "t3"]);
    let cli = groups.iter().find(|g| g.id == GROUP_CLI).expect("cli group");
    assert_eq!(cli.member_tool_ids, vec!["t1", "t3"]);
    assert!(groups.iter().all(|g| g.builtin));
}

#[test]
fn custom_group_lifecycle() {
    let state = create_test_state(sample_tools()).expect("create test state");

    let created = GroupService::create(&state, "  Mine ", vec!["t1".into(), "t2".into()])
        .expect("create group");
    assert!(created.id.starts_with("custom-"));
    assert_eq!(created.name, "Mine");
    assert!(!created.builtin);

    let renamed = GroupService::rename(&state, &created.id, "Ours").expect("rename");
    assert_eq!(renamed.name, "Ours");

    let listed = GroupService::list(&state).expect("list groups");
    assert_eq!(listed.last().map(|g| g.name.as_str()), Some("Ours"));

    assert!(GroupService::delete(&state, &created.id).expect("delete"));
    assert!(!GroupService::delete(&state, &created.id).expect("delete twice"));
}

#[test]
fn custom_group_input_is_validated() {
    let state = create_test_state(sample_tools()).expect("create test state");

    let err = GroupService::create(&state, "   ", vec![]).expect_err("empty name");
    assert!(err.is_validation());

    let err = GroupService::create(&state, "X", vec!["zz".into()]).expect_err("unknown member");
    assert!(err.english().contains("zz"));

    assert!(GroupService::rename(&state, GROUP_ALL, "Everything").is_err());
    assert!(GroupService::delete(&state, GROUP_CLI).is_err());
    assert!(GroupService::rename(&state, "custom-missing", "X").is_err());
}

#[test]
fn activating_group_projects_live_members() {
    let state = create_test_state(sample_tools()).expect("create test state");
    let group = GroupService::create(&state, "Mine", vec!["t2".into(), "t1".into()])
        .expect("create group");

    let selection = SelectionService::activate_group(&state, &group.id).expect("activate");

    assert_eq!(selection.active_group_id, group.id);
    assert_eq!(selection.selected_tool_ids, ids(&["t1"]), "uninstalled t2 is excluded");
    assert_eq!(state.db.load_selection().unwrap(), selection, "selection persisted");

    assert!(SelectionService::activate_group(&state, "custom-missing").is_err());
}

#[test]
fn editing_active_group_reprojects_and_deleting_falls_back_to_all() {
    let state = create_test_state(sample_tools()).expect("create test state");
    let group = GroupService::create(&state, "Mine", vec!["t1".into()]).expect("create group");
    SelectionService::activate_group(&state, &group.id).expect("activate");

    GroupService::set_members(&state, &group.id, vec!["t3".into()]).expect("set members");
    assert_eq!(state.selection().selected_tool_ids, ids(&["t3"]));

    GroupService::delete(&state, &group.id).expect("delete");
    let selection = state.selection();
    assert_eq!(selection.active_group_id, GROUP_ALL);
    assert_eq!(selection.selected_tool_ids, ids(&["t1", "t3"]));
}

#[test]
fn refresh_clears_stale_selection_once() {
    let state = create_test_state(sample_tools()).expect("create test state");
    SelectionService::select_rule(&state, Some("gone".into())).expect("select rule");
    SelectionService::select_mcp_set(&state, Some("gone-set".into())).expect("select mcp set");

    let snapshots = CatalogSnapshots {
        rules: Catalog::Ready(vec![rule("r1")]),
        mcp_sets: Catalog::Ready(vec![mcp_set("m1", &[("a", false)])]),
        status: Some(ToolSyncStatus::default()),
    };

    assert!(SelectionService::refresh(&state, &snapshots).expect("refresh"));
    let selection = state.db.load_selection().expect("load selection");
    assert_eq!(selection.selected_rule_id, None);
    assert_eq!(selection.selected_mcp_set_id, None);

    assert!(!SelectionService::refresh(&state, &snapshots).expect("second refresh"));
}

#[test]
fn refresh_waits_for_loading_snapshots() {
    let state = create_test_state(sample_tools()).expect("create test state");
    SelectionService::select_rule(&state, Some("gone".into())).expect("select rule");

    let snapshots = CatalogSnapshots {
        rules: Catalog::Ready(vec![rule("r1")]),
        mcp_sets: Catalog::Ready(vec![]),
        status: None,
    };

    assert!(!SelectionService::refresh(&state, &snapshots).expect("refresh"));
    assert_eq!(state.selection().selected_rule_id.as_deref(), Some("gone"));
}

#[test]
fn refresh_detects_mcp_set_from_enablement_and_recalls_rule() {
    let state = create_test_state(sample_tools()).expect("create test state");
    SelectionService::activate_group(&state, GROUP_ALL).expect("activate all");
    state
        .db
        .merge_last_success(GROUP_ALL, Some("r2".into()), None)
        .expect("seed last success");

    let dir = tempfile::tempdir().expect("tempdir");
    let store = McpEnablementStore::new(
        dir.path().join("mcp-tools.json"),
        ToolRegistry::from_tools(sample_tools()),
    );
    let applied = |servers: &[&str]| EnablementRecord {
        enabled: true,
        servers: Some(servers.iter().map(|s| s.to_string()).collect()),
    };
    store.set_record("t1", applied(&["github", "fs"])).expect("t1");
    store.set_record("t3", applied(&["fs", "github"])).expect("t3");

    let snapshots = CatalogSnapshots {
        rules: Catalog::Ready(vec![rule("r1"), rule("r2")]),
        mcp_sets: Catalog::Ready(vec![
            mcp_set("m1", &[("github", false)]),
            mcp_set("m2", &[("fs", false), ("github", false), ("slack", true)]),
        ]),
        status: Some(ToolSyncStatus::from_enablement(&store.load())),
    };

    assert!(SelectionService::refresh(&state, &snapshots).expect("refresh"));
    let selection = state.selection();
    assert_eq!(selection.selected_mcp_set_id.as_deref(), Some("m2"));
    assert_eq!(selection.selected_rule_id.as_deref(), Some("r2"));
}

#[test]
fn update_persists_only_real_changes() {
    let state = create_test_state(sample_tools()).expect("create test state");

    let selection = SelectionService::update(&state, |s| {
        s.select_rule(Some("  r1 ".into()));
        s.set_project_path(Some("   ".into()));
    })
    .expect("update");

    assert_eq!(selection.selected_rule_id.as_deref(), Some("r1"));
    assert_eq!(selection.project_path, None);
    assert_eq!(SelectionService::load(&state), selection);
    assert_eq!(state.db.load_selection().unwrap(), selection);
}

#[test]
fn active_group_follows_newly_installed_tools() {
    let state = create_test_state(vec![
        tool("t1", ToolCategory::Cli, true, true),
        tool("t2", ToolCategory::Ide, false, true),
    ])
    .expect("create test state");
    SelectionService::activate_group(&state, GROUP_ALL).expect("activate all");
    assert_eq!(state.selection().selected_tool_ids, ids(&["t1"]));

    let both_installed = vec![
        tool("t1", ToolCategory::Cli, true, true),
        tool("t2", ToolCategory::Ide, true, true),
    ];
    state
        .set_tool_catalog(Catalog::Ready(both_installed.clone()))
        .expect("set catalog");
    assert_eq!(state.selection().selected_tool_ids, ids(&["t1", "t2"]));

    // 直接写缓存绕过投影时，刷新调和也会补上
    state
        .set_tool_catalog(Catalog::Ready(vec![tool("t1", ToolCategory::Cli, true, true)]))
        .expect("shrink catalog");
    state
        .tool_catalog
        .set(Catalog::Ready(both_installed))
        .expect("raw catalog");
    let snapshots = CatalogSnapshots {
        rules: Catalog::Ready(vec![]),
        mcp_sets: Catalog::Ready(vec![]),
        status: Some(ToolSyncStatus::default()),
    };
    assert!(SelectionService::refresh(&state, &snapshots).expect("refresh"));
    assert_eq!(state.selection().selected_tool_ids, ids(&["t1", "t2"]));
    assert_eq!(
        state.db.load_selection().unwrap().selected_tool_ids,
        ids(&["t1", "t2"])
    );
}

#[test]
fn wildcard_selection_survives_catalog_refresh() {
    let state = create_test_state(sample_tools()).expect("create test state");
    SelectionService::select_tools(&state, ToolSelection::All).expect("select all");

    state
        .set_tool_catalog(Catalog::Ready(sample_tools()))
        .expect("set catalog");

    assert_eq!(state.selection().selected_tool_ids, ToolSelection::All);
}

#[test]
fn refresh_never_reverts_concurrent_user_changes() {
    let state = create_test_state(sample_tools()).expect("create test state");
    let snapshots = CatalogSnapshots {
        rules: Catalog::Ready(vec![rule("r1"), rule("r2")]),
        mcp_sets: Catalog::Ready(vec![]),
        status: Some(ToolSyncStatus::default()),
    };

    for _ in 0..200 {
        SelectionService::update(&state, |s| {
            s.select_rule(Some("r1".into()));
            s.select_mcp_set(Some("gone".into()));
        })
        .expect("seed selection");

        std::thread::scope(|scope| {
            scope.spawn(|| SelectionService::refresh(&state, &snapshots).expect("refresh"));
            scope.spawn(|| {
                SelectionService::select_rule(&state, Some("r2".into())).expect("select r2")
            });
        });

        let selection = state.selection();
        assert_eq!(selection.selected_rule_id.as_deref(), Some("r2"));
        assert_eq!(selection.selected_mcp_set_id, None);
        assert_eq!(state.db.load_selection().unwrap(), selection);
    }
}

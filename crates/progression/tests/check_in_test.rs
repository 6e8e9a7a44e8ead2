mod common;

use blocks::BlockContext;
use blocks::input::from_pairs;
use chrono::Duration;
use common::{TestApp, one_group};
use futures::future::join_all;
use progression::Error;
use progression::repository;
use progression::services::{CheckInService, Mode, TeamService};
use structure::{CompletionType, GameStructure, RoutingStrategy};

/// One instance, locations A (100 points) and B (40 points) in one free-roam group.
async fn game(must_check_out: bool, bonus: bool) -> TestApp {
    let app = TestApp::new().await;
    app.user("owner", 10, 0, false).await;
    app.instance_with("game", "owner", |settings| {
        settings.must_check_out = must_check_out;
        settings.enable_bonus_points = bonus;
    })
    .await;
    app.location("game", "loc-a", "AAAA", 100).await;
    app.location("game", "loc-b", "BBBB", 40).await;
    app.structure("game", &one_group("g1", &["loc-a", "loc-b"])).await;
    app
}

#[tokio::test]
async fn test_check_in_only_bonus_decays_per_visit() {
    let app = game(false, true).await;
    let service = CheckInService::new(app.ctx.clone());
    let codes = ["TEAM1", "TEAM2", "TEAM3", "TEAM4", "TEAM5"];
    for code in codes {
        app.team("game", code).await;
    }

    let mut awarded = Vec::new();
    for code in codes {
        let record = service.check_in(code, "aaaa").await.unwrap();
        assert!(!record.must_check_out);
        assert!(record.blocks_completed);
        assert_eq!(app.team_row(code).await.points, record.points);
        awarded.push(record.points);
    }
    assert_eq!(awarded, vec![200, 150, 120, 100, 100]);

    let location = app.location_row("loc-a").await;
    assert_eq!(location.total_visits, 5);
    assert_eq!(location.current_count, 5);
}

#[tokio::test]
async fn test_two_phase_visit() {
    let app = game(true, true).await;
    let service = CheckInService::new(app.ctx.clone());
    app.team("game", "TEAM1").await;
    app.team("game", "TEAM2").await;

    let record = service.check_in("TEAM1", "AAAA").await.unwrap();
    assert!(record.must_check_out);
    assert_eq!(record.points, 100);
    let team = app.team_row("TEAM1").await;
    assert_eq!(team.points, 100);
    assert_eq!(team.must_check_out, "loc-a");
    assert_eq!(app.location_row("loc-a").await.current_count, 1);

    // Blocked until checked out.
    let err = service.check_in("TEAM1", "BBBB").await.unwrap_err();
    assert!(matches!(err, Error::AlreadyCheckedIn));
    let err = service.check_out("TEAM1", "BBBB").await.unwrap_err();
    assert!(matches!(err, Error::CheckOutAtWrongLocation));

    app.clock.advance(Duration::minutes(10));
    let record = service.check_out("TEAM1", "AAAA").await.unwrap();
    assert_eq!(record.points, 200);
    assert_eq!(record.time_out, Some(app.now()));
    assert!(!record.must_check_out);

    let team = app.team_row("TEAM1").await;
    assert_eq!(team.points, 200);
    assert!(team.must_check_out.is_empty());

    let location = app.location_row("loc-a").await;
    assert_eq!(location.current_count, 0);
    assert_eq!(location.total_visits, 1);
    assert!((location.avg_duration - 300.0).abs() < 1e-9);

    let err = service.check_out("TEAM1", "AAAA").await.unwrap_err();
    assert!(matches!(err, Error::UnnecessaryCheckOut));

    // Second team to arrive only gets the second-visit bonus up front.
    let record = service.check_in("TEAM2", "AAAA").await.unwrap();
    assert_eq!(record.points, 50);
}

#[tokio::test]
async fn test_check_out_after_recount_still_records_stay() {
    let app = game(true, false).await;
    let service = CheckInService::new(app.ctx.clone());
    app.team("game", "TEAM1").await;

    service.check_in("TEAM1", "AAAA").await.unwrap();
    repository::locations::set_current_count(app.ctx.conn(), "loc-a", 0)
        .await
        .unwrap();

    app.clock.advance(Duration::minutes(4));
    service.check_out("TEAM1", "AAAA").await.unwrap();

    let location = app.location_row("loc-a").await;
    assert_eq!(location.current_count, 0);
    assert!((location.avg_duration - 120.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_unfinished_blocks_hold_check_out() {
    let app = game(true, false).await;
    let block = app.answer_block("quiz", "loc-a", "kea", 15).await;
    let service = CheckInService::new(app.ctx.clone());
    app.team("game", "TEAM1").await;

    let record = service.check_in("TEAM1", "AAAA").await.unwrap();
    assert!(!record.blocks_completed);
    assert_eq!(record.points, 0);

    let err = service.check_out("TEAM1", "AAAA").await.unwrap_err();
    assert!(matches!(err, Error::UnfinishedCheckIn));

    let wrong = from_pairs([("block", block.id.as_str()), ("answer", "tui")]);
    let (state, _) = service
        .validate_and_update_block_state("TEAM1", &wrong, Mode::Live)
        .await
        .unwrap();
    assert!(!state.complete);
    assert_eq!(app.team_row("TEAM1").await.points, 0);

    let right = from_pairs([("block", block.id.as_str()), ("answer", "kea")]);
    let (state, _) = service
        .validate_and_update_block_state("TEAM1", &right, Mode::Live)
        .await
        .unwrap();
    assert!(state.complete);
    assert_eq!(state.points_awarded, 15);
    assert_eq!(app.team_row("TEAM1").await.points, 15);

    // Re-submitting a completed block awards nothing more.
    let (state, _) = service
        .validate_and_update_block_state("TEAM1", &right, Mode::Live)
        .await
        .unwrap();
    assert!(state.complete);
    assert_eq!(app.team_row("TEAM1").await.points, 15);

    let check_in = repository::check_ins::get(app.ctx.conn(), "TEAM1", "loc-a").await.unwrap();
    assert!(check_in.blocks_completed);

    let record = service.check_out("TEAM1", "AAAA").await.unwrap();
    assert_eq!(record.points, 100);
    assert_eq!(app.team_row("TEAM1").await.points, 115);
}

#[tokio::test]
async fn test_completed_block_awards_its_points() {
    let app = game(false, false).await;
    let options: [(&str, &str); 7] = [
        ("points", "10"),
        ("question", "Which are birds?"),
        ("option_text", "Kiwi"),
        ("option_text", "Weta"),
        ("option_text", "Tui"),
        ("option_correct", "option_0"),
        ("option_correct", "option_2"),
    ];
    let mut multiple = options.to_vec();
    multiple.push(("multiple_choice", "on"));
    app.block("multi", "loc-a", BlockContext::LocationContent, "quiz_block", &multiple)
        .await;
    app.block("single", "loc-a", BlockContext::LocationContent, "quiz_block", &options)
        .await;
    let service = CheckInService::new(app.ctx.clone());
    app.team("game", "TEAM1").await;
    service.check_in("TEAM1", "AAAA").await.unwrap();
    assert_eq!(app.team_row("TEAM1").await.points, 100);

    // Only Kiwi: two of three options judged right.
    let partial = from_pairs([("block", "multi"), ("quiz_option", "option_0")]);
    let (state, block) = service
        .validate_and_update_block_state("TEAM1", &partial, Mode::Live)
        .await
        .unwrap();
    assert!(state.complete);
    assert_eq!(state.points_awarded, 7);
    assert_eq!(block.points(), 10);
    assert_eq!(app.team_row("TEAM1").await.points, 110);

    let wrong = from_pairs([("block", "single"), ("quiz_option", "option_1")]);
    let (state, _) = service
        .validate_and_update_block_state("TEAM1", &wrong, Mode::Live)
        .await
        .unwrap();
    assert!(state.complete);
    assert_eq!(state.points_awarded, 0);
    assert_eq!(app.team_row("TEAM1").await.points, 120);

    let check_in = repository::check_ins::get(app.ctx.conn(), "TEAM1", "loc-a").await.unwrap();
    assert!(check_in.blocks_completed);
}

#[tokio::test]
async fn test_preview_mode_persists_nothing() {
    let app = game(false, false).await;
    let block = app.answer_block("quiz", "loc-a", "kea", 15).await;
    let service = CheckInService::new(app.ctx.clone());
    app.team("game", "TEAM1").await;

    let input = from_pairs([("block", block.id.as_str()), ("answer", "kea")]);
    let (state, returned) = service
        .validate_and_update_block_state("TEAM1", &input, Mode::Preview)
        .await
        .unwrap();
    assert!(state.complete);
    assert_eq!(returned.id, block.id);
    assert_eq!(app.team_row("TEAM1").await.points, 0);
    assert!(
        repository::block_states::find(app.ctx.conn(), &block.id, "TEAM1")
            .await
            .unwrap()
            .is_none()
    );

    let err = service
        .validate_and_update_block_state("TEAM1", &from_pairs([("answer", "kea")]), Mode::Live)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
}

#[tokio::test]
async fn test_one_check_in_per_team_and_location() {
    let app = game(false, false).await;
    let service = CheckInService::new(app.ctx.clone());
    app.team("game", "TEAM1").await;

    let results = join_all((0..6).map(|_| {
        let service = service.clone();
        tokio::spawn(async move { service.check_in("TEAM1", "AAAA").await })
    }))
    .await;

    let mut succeeded = 0;
    for result in results {
        match result.expect("task panicked") {
            Ok(_) => succeeded += 1,
            Err(Error::AlreadyCheckedIn) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!(succeeded, 1);
    assert_eq!(app.team_row("TEAM1").await.points, 100);
    assert_eq!(app.location_row("loc-a").await.total_visits, 1);
}

#[tokio::test]
async fn test_unknown_and_unavailable_locations() {
    let app = game(false, false).await;
    app.instance("other", "owner").await;
    app.location("other", "loc-x", "XXXX", 10).await;

    let mut tree = one_group("g1", &["loc-a", "loc-b"]);
    tree.sub_groups[0].routing = RoutingStrategy::Ordered;
    app.structure("game", &tree).await;

    let service = CheckInService::new(app.ctx.clone());
    app.team("game", "TEAM1").await;

    let err = service.check_in("TEAM1", "ZZZZ").await.unwrap_err();
    assert!(matches!(err, Error::LocationNotFound(_)));
    let err = service.check_in("TEAM1", "XXXX").await.unwrap_err();
    assert!(matches!(err, Error::LocationNotFound(_)));
    let err = service.check_in("TEAM1", "BBBB").await.unwrap_err();
    assert!(matches!(err, Error::InvalidLocation(_)));

    service.check_in("TEAM1", "AAAA").await.unwrap();
    service.check_in("TEAM1", "BBBB").await.unwrap();
    let err = service.check_in("TEAM1", "AAAA").await.unwrap_err();
    assert!(matches!(err, Error::AlreadyCheckedIn));
}

#[tokio::test]
async fn test_skip_group_after_minimum() {
    let app = game(false, false).await;
    app.location("game", "loc-c", "CCCC", 10).await;

    let mut first = GameStructure::new_group(
        "g1",
        "First",
        "red",
        vec!["loc-a".to_string(), "loc-b".to_string()],
    );
    first.completion_type = CompletionType::Minimum;
    first.minimum_required = 1;
    first.auto_advance = false;
    let mut root = GameStructure::new_root("root");
    root.sub_groups.push(first);
    root.sub_groups
        .push(GameStructure::new_group("g2", "Second", "green", vec!["loc-c".to_string()]));
    app.structure("game", &root).await;

    let teams = TeamService::new(app.ctx.clone());
    let service = CheckInService::new(app.ctx.clone());
    app.team("game", "TEAM1").await;

    let err = teams.skip_group("TEAM1", "g1").await.unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));

    service.check_in("TEAM1", "AAAA").await.unwrap();
    let err = service.check_in("TEAM1", "CCCC").await.unwrap_err();
    assert!(matches!(err, Error::InvalidLocation(_)));

    let err = teams.skip_group("TEAM1", "g2").await.unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));

    let skipped = teams.skip_group("TEAM1", "g1").await.unwrap();
    assert_eq!(skipped, vec!["g1".to_string()]);
    assert_eq!(app.team_row("TEAM1").await.skipped_groups(), vec!["g1".to_string()]);

    let err = service.check_in("TEAM1", "BBBB").await.unwrap_err();
    assert!(matches!(err, Error::InvalidLocation(_)));
    service.check_in("TEAM1", "CCCC").await.unwrap();
}

#[tokio::test]
async fn test_reset_teams_clears_progress() {
    let app = game(true, false).await;
    let block = app.answer_block("quiz", "loc-a", "kea", 15).await;
    let service = CheckInService::new(app.ctx.clone());
    let teams = TeamService::new(app.ctx.clone());
    app.team("game", "TEAM1").await;
    app.team("game", "TEAM2").await;

    service.check_in("TEAM1", "AAAA").await.unwrap();
    service.check_in("TEAM2", "AAAA").await.unwrap();
    let input = from_pairs([("block", block.id.as_str()), ("answer", "kea")]);
    service
        .validate_and_update_block_state("TEAM1", &input, Mode::Live)
        .await
        .unwrap();
    assert_eq!(app.location_row("loc-a").await.current_count, 2);

    teams.reset_teams("game", &["team1".to_string()]).await.unwrap();

    let team = app.team_row("TEAM1").await;
    assert_eq!(team.points, 0);
    assert!(team.must_check_out.is_empty());
    assert!(!team.has_started);
    assert!(
        repository::check_ins::find_by_team(app.ctx.conn(), "TEAM1")
            .await
            .unwrap()
            .is_empty()
    );
    assert!(
        repository::block_states::find(app.ctx.conn(), &block.id, "TEAM1")
            .await
            .unwrap()
            .is_none()
    );

    let location = app.location_row("loc-a").await;
    assert_eq!(location.current_count, 1);
    assert_eq!(location.total_visits, 2);
    assert_eq!(app.team_row("TEAM2").await.must_check_out, "loc-a");
}

#[tokio::test]
async fn test_add_teams_refuses_templates() {
    let app = game(false, false).await;
    let teams = TeamService::new(app.ctx.clone());

    let created = teams.add_teams("game", 5).await.unwrap();
    assert_eq!(created.len(), 5);
    assert_eq!(teams.find_all("game").await.unwrap().len(), 5);
    for team in &created {
        assert_eq!(team.code.len(), 4);
        assert_eq!(teams.get_team_by_code(&team.code.to_lowercase()).await.unwrap().id, team.id);
    }

    let now = app.now();
    repository::instances::insert(
        app.ctx.conn(),
        progression::entity::instances::Model {
            id: "template".to_string(),
            user_id: "owner".to_string(),
            name: "Template".to_string(),
            is_template: true,
            game_structure: None,
            created_at: now,
            updated_at: now,
        },
    )
    .await
    .unwrap();
    let err = teams.add_teams("template", 1).await.unwrap_err();
    assert!(matches!(err, Error::TemplateHasNoTeams));
}

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use blocks::{Block, BlockContext};
use chrono::{DateTime, TimeZone, Utc};
use progression::entity::{instances, locations, markers};
use progression::error::Result;
use progression::repository;
use progression::services::{AppContext, CheckoutRequest, CheckoutSession, PaymentGateway};
use progression::{Config, Database, FixedClock, PaymentConfig, database};
use sea_orm::{ConnectOptions, Database as SeaOrmDatabase};
use structure::GameStructure;

pub const WEBHOOK_SECRET: &str = "whsec_test";

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 14, 10, 0, 0).unwrap()
}

/// Fresh in-memory database with the full schema. One connection, so every
/// pooled handle sees the same memory database.
pub async fn setup_db() -> Database {
    let mut opt = ConnectOptions::new("sqlite::memory:");
    opt.max_connections(1).min_connections(1).sqlx_logging(false);
    let connection = SeaOrmDatabase::connect(opt).await.expect("connect sqlite");
    database::create_schema(&connection).await.expect("create schema");
    Database::from_connection(connection)
}

pub struct TestApp {
    pub ctx: AppContext,
    pub clock: Arc<FixedClock>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(Config::default()).await
    }

    pub async fn with_payments() -> Self {
        Self::with_config(Config {
            site_url: "https://play.example.com".to_string(),
            payments: Some(PaymentConfig::new("sk_test", WEBHOOK_SECRET)),
            ..Default::default()
        })
        .await
    }

    pub async fn with_config(config: Config) -> Self {
        let db = setup_db().await;
        let clock = Arc::new(FixedClock::new(start_time()));
        let ctx = AppContext::new(db, config).with_clock(clock.clone());
        Self { ctx, clock }
    }

    pub fn now(&self) -> DateTime<Utc> {
        progression::Clock::now(self.clock.as_ref())
    }

    pub async fn user(&self, id: &str, free: i32, paid: i32, is_educator: bool) {
        let mut user = repository::users::new_user(id, format!("{id}@example.com"), id, is_educator, self.now());
        user.free_credits = free;
        user.paid_credits = paid;
        repository::users::insert(self.ctx.conn(), user).await.unwrap();
    }

    pub async fn instance(&self, id: &str, user_id: &str) {
        self.instance_with(id, user_id, |_| {}).await;
    }

    /// Instance with default settings adjusted by `configure`.
    pub async fn instance_with(
        &self,
        id: &str,
        user_id: &str,
        configure: impl FnOnce(&mut progression::entity::instance_settings::Model),
    ) {
        let now = self.now();
        repository::instances::insert(
            self.ctx.conn(),
            instances::Model {
                id: id.to_string(),
                user_id: user_id.to_string(),
                name: format!("Game {id}"),
                is_template: false,
                game_structure: None,
                created_at: now,
                updated_at: now,
            },
        )
        .await
        .unwrap();
        let mut settings = repository::settings::defaults(id);
        configure(&mut settings);
        repository::settings::insert(self.ctx.conn(), settings).await.unwrap();
    }

    pub async fn structure(&self, instance_id: &str, tree: &GameStructure) {
        repository::instances::update_structure(
            self.ctx.conn(),
            instance_id,
            tree.to_json().unwrap(),
            self.now(),
        )
        .await
        .unwrap();
    }

    /// Location `id` behind marker `marker`.
    pub async fn location(&self, instance_id: &str, id: &str, marker: &str, points: i32) {
        repository::markers::insert(
            self.ctx.conn(),
            markers::Model {
                code: marker.to_string(),
                lat: -43.53,
                lng: 172.63,
                name: format!("Marker {marker}"),
            },
        )
        .await
        .unwrap();
        repository::locations::insert(
            self.ctx.conn(),
            locations::Model {
                id: id.to_string(),
                instance_id: instance_id.to_string(),
                name: format!("Location {id}"),
                marker_id: marker.to_uppercase(),
                points,
                ordering: 0,
                total_visits: 0,
                current_count: 0,
                avg_duration: 0.0,
            },
        )
        .await
        .unwrap();
    }

    pub async fn location_row(&self, id: &str) -> locations::Model {
        repository::locations::get(self.ctx.conn(), id).await.unwrap()
    }

    pub async fn team(&self, instance_id: &str, code: &str) {
        let team = repository::teams::new_team(format!("team-{code}"), code, instance_id, self.now());
        repository::teams::insert(self.ctx.conn(), team).await.unwrap();
    }

    pub async fn team_row(&self, code: &str) -> progression::entity::teams::Model {
        repository::teams::get_by_code(self.ctx.conn(), code).await.unwrap()
    }

    /// Answer block at `owner_id` that completes on `answer`.
    pub async fn answer_block(&self, id: &str, owner_id: &str, answer: &str, points: i32) -> Block {
        let points = points.to_string();
        self.block(
            id,
            owner_id,
            BlockContext::LocationContent,
            "answer",
            &[("prompt", "What is it?"), ("answer", answer), ("points", points.as_str())],
        )
        .await
    }

    pub async fn image_block(&self, id: &str, owner_id: &str, url: &str) -> Block {
        self.block(id, owner_id, BlockContext::LocationContent, "image", &[("url", url)])
            .await
    }

    pub async fn block(
        &self,
        id: &str,
        owner_id: &str,
        context: BlockContext,
        block_type: &str,
        fields: &[(&str, &str)],
    ) -> Block {
        let mut block = Block::new(id, owner_id, context, block_type, 0).unwrap();
        block
            .update_block_data(&blocks::input::from_pairs(fields.iter().copied()))
            .unwrap();
        repository::blocks::insert(self.ctx.conn(), &block).await.unwrap();
        block
    }
}

/// Single visible group holding `location_ids`.
pub fn one_group(group_id: &str, location_ids: &[&str]) -> GameStructure {
    let mut root = GameStructure::new_root("root");
    root.sub_groups.push(GameStructure::new_group(
        group_id,
        "Group",
        "blue",
        location_ids.iter().map(|id| id.to_string()).collect(),
    ));
    root
}

/// Gateway that records checkout requests and hands out predictable sessions.
#[derive(Debug, Default)]
pub struct MockGateway {
    pub requests: Mutex<Vec<CheckoutRequest>>,
    pub receipt: Option<String>,
}

impl MockGateway {
    pub fn with_receipt(receipt: &str) -> Self {
        Self {
            receipt: Some(receipt.to_string()),
            ..Default::default()
        }
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_checkout_session(&self, request: &CheckoutRequest) -> Result<CheckoutSession> {
        let mut requests = self.requests.lock().unwrap();
        requests.push(request.clone());
        Ok(CheckoutSession {
            id: format!("cs_test_{}", requests.len()),
            url: Some(format!("https://checkout.example.com/{}", request.purchase_id)),
            customer_id: Some("cus_test".to_string()),
        })
    }

    async fn receipt_url(&self, _payment_intent_id: &str) -> Result<Option<String>> {
        Ok(self.receipt.clone())
    }
}

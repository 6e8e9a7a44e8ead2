//! Database connection and schema management

use std::sync::Arc;
use std::time::Duration;

use sea_orm::sea_query::{Index, IndexCreateStatement};
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database as SeaOrmDatabase, DatabaseConnection, DbErr,
    EntityTrait, Schema,
};
use tracing::{error, info, warn};

use crate::config::DatabaseConfig;
use crate::entity::*;

const MAX_ATTEMPTS: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_secs(2);

/// Connection pool wrapper
#[derive(Clone)]
pub struct Database {
    connection: Arc<DatabaseConnection>,
}

impl Database {
    /// Connect with the configured pool settings, retrying a few times.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, DbErr> {
        info!(url = %mask_url(&config.url), "Connecting to database");

        let mut attempts = 0;
        loop {
            attempts += 1;

            let mut opt = ConnectOptions::new(config.url.clone());
            opt.max_connections(config.max_connections)
                .min_connections(config.min_connections)
                .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
                .acquire_timeout(Duration::from_secs(30))
                .idle_timeout(Duration::from_secs(300))
                .sqlx_logging(config.sql_logging);

            match SeaOrmDatabase::connect(opt).await {
                Ok(connection) => {
                    info!(
                        max = config.max_connections,
                        min = config.min_connections,
                        "Connected to database"
                    );
                    return Ok(Self::from_connection(connection));
                }
                Err(e) if attempts < MAX_ATTEMPTS => {
                    warn!("Failed to connect (attempt {}/{}): {}", attempts, MAX_ATTEMPTS, e);
                    tokio::time::sleep(RETRY_DELAY).await;
                }
                Err(e) => {
                    error!("Failed to connect after {} attempts: {}", MAX_ATTEMPTS, e);
                    return Err(e);
                }
            }
        }
    }

    pub fn from_connection(connection: DatabaseConnection) -> Self {
        Self {
            connection: Arc::new(connection),
        }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.connection
    }

    pub fn connection_arc(&self) -> Arc<DatabaseConnection> {
        self.connection.clone()
    }

    pub async fn health_check(&self) -> Result<(), DbErr> {
        self.connection.ping().await
    }
}

/// Create every table and index if missing.
pub async fn create_schema<C: ConnectionTrait>(db: &C) -> Result<(), DbErr> {
    let schema = Schema::new(db.get_database_backend());

    create_table(db, &schema, Users).await?;
    create_table(db, &schema, Instances).await?;
    create_table(db, &schema, InstanceSettings).await?;
    create_table(db, &schema, Locations).await?;
    create_table(db, &schema, Markers).await?;
    create_table(db, &schema, Teams).await?;
    create_table(db, &schema, CheckIns).await?;
    create_table(db, &schema, Blocks).await?;
    create_table(db, &schema, BlockStates).await?;
    create_table(db, &schema, CreditPurchases).await?;
    create_table(db, &schema, CreditAdjustments).await?;
    create_table(db, &schema, TeamStartLogs).await?;

    let indexes: Vec<IndexCreateStatement> = vec![
        Index::create()
            .name("idx_locations_instance_marker")
            .table(Locations)
            .col(locations::Column::InstanceId)
            .col(locations::Column::MarkerId)
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("idx_teams_instance")
            .table(Teams)
            .col(teams::Column::InstanceId)
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("idx_check_ins_instance")
            .table(CheckIns)
            .col(check_ins::Column::InstanceId)
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("idx_blocks_owner_context")
            .table(Blocks)
            .col(blocks::Column::OwnerId)
            .col(blocks::Column::Context)
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("idx_credit_adjustments_user_created")
            .table(CreditAdjustments)
            .col(credit_adjustments::Column::UserId)
            .col(credit_adjustments::Column::CreatedAt)
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("idx_team_start_logs_user_created")
            .table(TeamStartLogs)
            .col(team_start_logs::Column::UserId)
            .col(team_start_logs::Column::CreatedAt)
            .if_not_exists()
            .to_owned(),
    ];
    let backend = db.get_database_backend();
    for index in &indexes {
        db.execute(backend.build(index)).await?;
    }

    info!("Database schema ready");
    Ok(())
}

async fn create_table<C, E>(db: &C, schema: &Schema, entity: E) -> Result<(), DbErr>
where
    C: ConnectionTrait,
    E: EntityTrait,
{
    let mut statement = schema.create_table_from_entity(entity);
    statement.if_not_exists();
    db.execute(db.get_database_backend().build(&statement)).await?;
    Ok(())
}

/// Hide the password part of a connection URL before logging it.
pub fn mask_url(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(mut parsed) if parsed.password().is_some() => {
            if parsed.set_password(Some("****")).is_ok() {
                parsed.to_string()
            } else {
                "****".to_string()
            }
        }
        Ok(_) => raw.to_string(),
        Err(_) => match raw.find('@') {
            Some(at) => format!("****{}", &raw[at..]),
            None => raw.to_string(),
        },
    }
}

use async_trait::async_trait;
use neo4rs::{BoltNull, BoltType, ConfigBuilder, Graph, Query};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

use crate::cypher::{self, CypherStatement, MERGED_COLUMN};
use crate::data::{
    errors::StateStoreError,
    records::PropertyValue,
    trace_context::TraceContext,
};
use crate::traits::graph_store::{ApplyOutcome, GraphStore, MissingEndpointPolicy, UpsertPlan};

macro_rules! trace_neo4j {
    ($trace_ctx:expr, $op:expr, $($arg:tt)*) => {
        debug!("[Neo4j:{}][trace:{}] {}", $op, $trace_ctx.trace_id, format!($($arg)*));
    };
}

/// Configuration for Neo4j connection
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Neo4jConfig {
    pub uri: String,
    pub username: String,
    /// No default; must come from configuration or the environment.
    pub password: String,
    pub database: Option<String>,
    pub pool_size: usize,
    #[serde(rename = "connect_retries")]
    pub connection_retry_count: u32,
    #[serde(with = "duration_ms", rename = "connect_retry_delay_ms")]
    pub connection_retry_delay: Duration,
}

impl Default for Neo4jConfig {
    fn default() -> Self {
        Self {
            uri: "bolt://localhost:7687".to_string(),
            username: "neo4j".to_string(),
            password: String::new(),
            database: None,
            pool_size: 10,
            connection_retry_count: 3,
            connection_retry_delay: Duration::from_secs(2),
        }
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Neo4j implementation of the `GraphStore` trait
pub struct Neo4jGraphStore {
    pub graph: Arc<Graph>,
}

impl Neo4jGraphStore {
    /// Connects with retries and checks the connection with a trivial query.
    pub async fn new(config: Neo4jConfig) -> Result<Self, StateStoreError> {
        if config.password.is_empty() {
            return Err(StateStoreError::InvalidInput(
                "Neo4j password is not configured".to_string(),
            ));
        }

        let mut config_builder = ConfigBuilder::default()
            .uri(&config.uri)
            .user(&config.username)
            .password(&config.password)
            .max_connections(config.pool_size);

        if let Some(db) = &config.database {
            config_builder = config_builder.db(db.as_str());
        }

        let neo4j_config = config_builder.build().map_err(|e| {
            StateStoreError::InvalidInput(format!("Failed to build Neo4j config: {}", e))
        })?;

        let attempts = config.connection_retry_count.max(1);
        let mut last_error = None;
        for attempt in 1..=attempts {
            match Graph::connect(neo4j_config.clone()).await {
                Ok(graph) => {
                    match graph.run(Query::new("RETURN 1".to_string())).await {
                        Ok(()) => {
                            info!("Connected to Neo4j at {} (attempt {})", config.uri, attempt);
                            return Ok(Self { graph: Arc::new(graph) });
                        },
                        Err(e) => {
                            error!("Connection test failed: {}", e);
                            last_error = Some(e.to_string());
                        },
                    }
                },
                Err(e) => {
                    error!("Failed to connect to Neo4j (attempt {}): {}", attempt, e);
                    last_error = Some(e.to_string());
                },
            }
            if attempt < attempts {
                tokio::time::sleep(config.connection_retry_delay).await;
            }
        }

        Err(StateStoreError::ConnectionError(format!(
            "Failed to connect to Neo4j at {} after {} attempts. Last error: {}",
            config.uri,
            attempts,
            last_error.unwrap_or_else(|| "unknown".to_string())
        )))
    }
}

/// Builds a driver query from a generated statement.
fn to_query(stmt: &CypherStatement) -> Query {
    stmt.params.iter().fold(Query::new(stmt.text.clone()), |query, (name, value)| {
        match value {
            PropertyValue::Bool(b) => query.param(name, *b),
            PropertyValue::Integer(i) => query.param(name, *i),
            PropertyValue::Float(f) => query.param(name, *f),
            PropertyValue::String(s) => query.param(name, s.as_str()),
            PropertyValue::StringList(items) => query.param(name, items.clone()),
            PropertyValue::Null => query.param(name, BoltType::Null(BoltNull)),
        }
    })
}

/// Connection-level failures are worth retrying; anything the server rejected is not.
fn map_neo4j_error(context: &str, err: neo4rs::Error) -> StateStoreError {
    match err {
        neo4rs::Error::IOError { .. } | neo4rs::Error::ConnectionError { .. } => {
            StateStoreError::ConnectionError(format!("{}: {}", context, err))
        },
        other => StateStoreError::QueryError(format!("{}: {}", context, other)),
    }
}

impl Neo4jGraphStore {
    async fn apply_in_txn(
        &self,
        txn: &mut neo4rs::Txn,
        trace_ctx: &TraceContext,
        plan: &UpsertPlan,
    ) -> Result<ApplyOutcome, StateStoreError> {
        let mut outcome = ApplyOutcome::default();

        for node in &plan.nodes {
            let stmt = cypher::node_upsert(node, plan.property_mode);
            trace_neo4j!(trace_ctx, "node", "{}", stmt.text);
            txn.run(to_query(&stmt)).await.map_err(|e| {
                map_neo4j_error(&format!("Failed to upsert node {}:{}", node.label, node.id), e)
            })?;
            outcome.nodes_written += 1;
        }

        for rel in &plan.relationships {
            let stmt = cypher::relationship_upsert(rel);
            trace_neo4j!(trace_ctx, "relationship", "{}", stmt.text);

            let mut stream = txn
                .execute(to_query(&stmt))
                .await
                .map_err(|e| {
                    map_neo4j_error(&format!("Failed to upsert relationship {}", rel), e)
                })?;

            let mut merged = 0i64;
            while let Some(row) = stream
                .next(txn.handle())
                .await
                .map_err(|e| map_neo4j_error("Failed to read relationship result", e))?
            {
                merged += row.get::<i64>(MERGED_COLUMN).map_err(|e| {
                    StateStoreError::MappingError(format!(
                        "Missing {} column: {}",
                        MERGED_COLUMN, e
                    ))
                })?;
            }

            if merged > 0 {
                outcome.relationships_merged += 1;
                continue;
            }

            match plan.missing_endpoint {
                MissingEndpointPolicy::Skip => outcome.unmatched.push(rel.clone()),
                MissingEndpointPolicy::Fail => {
                    return Err(StateStoreError::MissingEndpoint {
                        from: rel.from.to_string(),
                        rel_type: rel.rel_type.clone(),
                        to: rel.to.to_string(),
                    });
                },
            }
        }

        Ok(outcome)
    }
}

#[async_trait]
impl GraphStore for Neo4jGraphStore {
    #[instrument(
        skip(self, plan),
        fields(trace_id = %trace_ctx.trace_id, mutations = plan.mutation_count())
    )]
    async fn apply(
        &self,
        trace_ctx: &TraceContext,
        plan: &UpsertPlan,
    ) -> Result<ApplyOutcome, StateStoreError> {
        let mut txn = self
            .graph
            .start_txn()
            .await
            .map_err(|e| map_neo4j_error("Failed to start transaction", e))?;

        match self.apply_in_txn(&mut txn, trace_ctx, plan).await {
            Ok(outcome) => {
                txn.commit()
                    .await
                    .map_err(|e| map_neo4j_error("Failed to commit transaction", e))?;
                trace_neo4j!(
                    trace_ctx,
                    "commit",
                    "{} nodes, {} relationships merged",
                    outcome.nodes_written,
                    outcome.relationships_merged
                );
                Ok(outcome)
            },
            Err(e) => {
                if let Err(rollback_err) = txn.rollback().await {
                    warn!("Rollback failed after error {}: {}", e, rollback_err);
                }
                Err(e)
            },
        }
    }

    async fn ping(&self) -> Result<(), StateStoreError> {
        self.graph
            .run(Query::new("RETURN 1".to_string()))
            .await
            .map_err(|e| map_neo4j_error("Ping failed", e))
    }
}

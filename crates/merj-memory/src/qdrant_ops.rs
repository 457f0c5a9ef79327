//! Qdrant-backed vector index.
//!
//! Collections are created with Euclidean distance, so the score Qdrant
//! reports for a hit is the raw distance.

use std::collections::HashMap;

use qdrant_client::qdrant::point_id::PointIdOptions;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::{
    CreateCollectionBuilder, Distance, PointId, PointStruct, ScoredPoint, SearchPointsBuilder,
    UpsertPointsBuilder, Value, VectorParamsBuilder,
};
use qdrant_client::Qdrant;

use crate::vector_store::{
    BoxFuture, ScoredVectorPoint, VectorPoint, VectorStore, VectorStoreError,
};

/// Points per upsert request. Whole-repository indexes can exceed the
/// server's request size limit in one call.
const UPSERT_BATCH: usize = 256;

#[derive(Clone)]
pub struct QdrantOps {
    client: Qdrant,
    url: String,
}

impl std::fmt::Debug for QdrantOps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QdrantOps")
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

impl QdrantOps {
    /// Build a client for the gRPC endpoint at `url`. No request is made.
    ///
    /// # Errors
    ///
    /// Returns [`VectorStoreError::Connection`] if the URL is rejected.
    pub fn new(url: &str) -> Result<Self, VectorStoreError> {
        let client = Qdrant::from_url(url)
            .build()
            .map_err(|e| VectorStoreError::Connection(format!("{url}: {e}")))?;
        Ok(Self {
            client,
            url: url.to_owned(),
        })
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

fn to_payload(
    payload: HashMap<String, serde_json::Value>,
) -> Result<HashMap<String, Value>, VectorStoreError> {
    serde_json::from_value(serde_json::Value::Object(payload.into_iter().collect()))
        .map_err(|e| VectorStoreError::Upsert(format!("invalid payload: {e}")))
}

fn json_value(value: Value) -> Option<serde_json::Value> {
    Some(match value.kind? {
        Kind::StringValue(s) => serde_json::Value::String(s),
        Kind::IntegerValue(i) => serde_json::Value::from(i),
        Kind::DoubleValue(d) => serde_json::Number::from_f64(d).map(serde_json::Value::Number)?,
        Kind::BoolValue(b) => serde_json::Value::Bool(b),
        _ => return None,
    })
}

fn point_id_string(id: Option<PointId>) -> String {
    match id.and_then(|pid| pid.point_id_options) {
        Some(PointIdOptions::Uuid(u)) => u,
        Some(PointIdOptions::Num(n)) => n.to_string(),
        None => String::new(),
    }
}

fn hit_from_scored(point: ScoredPoint) -> ScoredVectorPoint {
    ScoredVectorPoint {
        id: point_id_string(point.id),
        distance: point.score.is_finite().then_some(point.score),
        payload: point
            .payload
            .into_iter()
            .filter_map(|(k, v)| json_value(v).map(|v| (k, v)))
            .collect(),
    }
}

impl VectorStore for QdrantOps {
    fn ensure_collection(
        &self,
        collection: &str,
        vector_size: u64,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            if self.collection_exists(collection.as_str()).await? {
                return Ok(());
            }
            self.client
                .create_collection(
                    CreateCollectionBuilder::new(collection.as_str())
                        .vectors_config(VectorParamsBuilder::new(vector_size, Distance::Euclid)),
                )
                .await
                .map_err(|e| VectorStoreError::Collection(e.to_string()))?;
            tracing::info!(%collection, vector_size, "created Qdrant collection");
            Ok(())
        })
    }

    fn collection_exists(&self, collection: &str) -> BoxFuture<'_, Result<bool, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            self.client
                .collection_exists(collection.as_str())
                .await
                .map_err(|e| VectorStoreError::Connection(format!("{}: {e}", self.url)))
        })
    }

    fn delete_collection(&self, collection: &str) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            self.client
                .delete_collection(collection.as_str())
                .await
                .map_err(|e| VectorStoreError::Collection(e.to_string()))?;
            tracing::debug!(%collection, "deleted Qdrant collection");
            Ok(())
        })
    }

    fn upsert(
        &self,
        collection: &str,
        points: Vec<VectorPoint>,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let total = points.len();
            let mut batch = Vec::with_capacity(UPSERT_BATCH.min(total));
            let mut points = points.into_iter().peekable();
            while let Some(p) = points.next() {
                batch.push(PointStruct::new(p.id, p.vector, to_payload(p.payload)?));
                if batch.len() == UPSERT_BATCH || points.peek().is_none() {
                    self.client
                        .upsert_points(
                            UpsertPointsBuilder::new(collection.as_str(), std::mem::take(&mut batch))
                                .wait(true),
                        )
                        .await
                        .map_err(|e| VectorStoreError::Upsert(e.to_string()))?;
                }
            }
            tracing::debug!(%collection, points = total, "upserted points");
            Ok(())
        })
    }

    fn search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: u64,
    ) -> BoxFuture<'_, Result<Vec<ScoredVectorPoint>, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let response = self
                .client
                .search_points(
                    SearchPointsBuilder::new(collection.as_str(), vector, limit).with_payload(true),
                )
                .await
                .map_err(|e| VectorStoreError::Search(e.to_string()))?;
            Ok(response.result.into_iter().map(hit_from_scored).collect())
        })
    }
}

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::vector_store::{
    BoxFuture, ScoredVectorPoint, VectorPoint, VectorStore, VectorStoreError,
};

struct StoredPoint {
    id: String,
    vector: Vec<f32>,
    payload: HashMap<String, serde_json::Value>,
}

/// Points kept in insertion order, so equal distances rank deterministically.
struct InMemoryCollection {
    vector_size: u64,
    positions: HashMap<String, usize>,
    points: Vec<StoredPoint>,
}

impl InMemoryCollection {
    fn new(vector_size: u64) -> Self {
        Self {
            vector_size,
            positions: HashMap::new(),
            points: Vec::new(),
        }
    }

    fn insert(&mut self, point: VectorPoint) -> Result<(), String> {
        if u64::try_from(point.vector.len()).ok() != Some(self.vector_size) {
            return Err(format!(
                "point {} has {} dimensions, expected {}",
                point.id,
                point.vector.len(),
                self.vector_size
            ));
        }
        let stored = StoredPoint {
            id: point.id,
            vector: point.vector,
            payload: point.payload,
        };
        if let Some(&pos) = self.positions.get(&stored.id) {
            self.points[pos] = stored;
        } else {
            self.positions.insert(stored.id.clone(), self.points.len());
            self.points.push(stored);
        }
        Ok(())
    }

    fn nearest(&self, query: &[f32], limit: usize) -> Vec<ScoredVectorPoint> {
        let mut ranked: Vec<(f32, &StoredPoint)> = self
            .points
            .iter()
            .map(|p| (euclidean_distance(query, &p.vector), p))
            .collect();
        // stable sort keeps insertion order among ties
        ranked.sort_by(|a, b| a.0.total_cmp(&b.0));
        ranked
            .into_iter()
            .take(limit)
            .map(|(distance, p)| ScoredVectorPoint {
                id: p.id.clone(),
                distance: Some(distance),
                payload: p.payload.clone(),
            })
            .collect()
    }
}

/// Process-local store with exact Euclidean search.
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, InMemoryCollection>>,
}

impl InMemoryVectorStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryVectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryVectorStore")
            .finish_non_exhaustive()
    }
}

fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

fn poisoned<T>(e: &PoisonError<T>) -> VectorStoreError {
    VectorStoreError::Collection(format!("store lock poisoned: {e}"))
}

impl VectorStore for InMemoryVectorStore {
    fn ensure_collection(
        &self,
        collection: &str,
        vector_size: u64,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            self.collections
                .write()
                .map_err(|e| poisoned(&e))?
                .entry(collection)
                .or_insert_with(|| InMemoryCollection::new(vector_size));
            Ok(())
        })
    }

    fn collection_exists(&self, collection: &str) -> BoxFuture<'_, Result<bool, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let cols = self.collections.read().map_err(|e| poisoned(&e))?;
            Ok(cols.contains_key(&collection))
        })
    }

    fn delete_collection(&self, collection: &str) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            self.collections
                .write()
                .map_err(|e| poisoned(&e))?
                .remove(&collection);
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
            let mut cols = self.collections.write().map_err(|e| poisoned(&e))?;
            let col = cols.get_mut(&collection).ok_or_else(|| {
                VectorStoreError::Upsert(format!("collection {collection} not found"))
            })?;
            for point in points {
                col.insert(point)
                    .map_err(|e| VectorStoreError::Upsert(format!("{collection}: {e}")))?;
            }
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
            let cols = self.collections.read().map_err(|e| poisoned(&e))?;
            let col = cols.get(&collection).ok_or_else(|| {
                VectorStoreError::Search(format!("collection {collection} not found"))
            })?;
            Ok(col.nearest(&vector, usize::try_from(limit).unwrap_or(usize::MAX)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(id: &str, vector: Vec<f32>) -> VectorPoint {
        VectorPoint {
            id: id.into(),
            vector,
            payload: HashMap::from([("name".into(), serde_json::json!(id))]),
        }
    }

    #[tokio::test]
    async fn ensure_collection_and_exists() {
        let store = InMemoryVectorStore::new();
        assert!(!store.collection_exists("test").await.unwrap());
        store.ensure_collection("test", 3).await.unwrap();
        assert!(store.collection_exists("test").await.unwrap());
    }

    #[tokio::test]
    async fn ensure_collection_idempotent() {
        let store = InMemoryVectorStore::new();
        store.ensure_collection("test", 3).await.unwrap();
        store
            .upsert("test", vec![point("a", vec![1.0, 0.0, 0.0])])
            .await
            .unwrap();
        store.ensure_collection("test", 3).await.unwrap();
        let results = store.search("test", vec![1.0, 0.0, 0.0], 5).await.unwrap();
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn delete_collection_removes() {
        let store = InMemoryVectorStore::new();
        store.ensure_collection("test", 3).await.unwrap();
        store.delete_collection("test").await.unwrap();
        assert!(!store.collection_exists("test").await.unwrap());
    }

    #[tokio::test]
    async fn search_ranks_closest_first() {
        let store = InMemoryVectorStore::new();
        store.ensure_collection("test", 3).await.unwrap();
        store
            .upsert(
                "test",
                vec![
                    point("far", vec![0.0, 3.0, 0.0]),
                    point("near", vec![1.0, 0.0, 0.0]),
                    point("mid", vec![1.0, 1.0, 0.0]),
                ],
            )
            .await
            .unwrap();

        let results = store.search("test", vec![1.0, 0.0, 0.0], 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "near");
        assert_eq!(results[1].id, "mid");
        assert!(results[0].distance.unwrap().abs() < f32::EPSILON);
        assert!((results[1].distance.unwrap() - 1.0).abs() < f32::EPSILON);
        assert_eq!(results[1].payload["name"], serde_json::json!("mid"));
    }

    #[tokio::test]
    async fn ties_keep_insertion_order() {
        let store = InMemoryVectorStore::new();
        store.ensure_collection("test", 2).await.unwrap();
        store
            .upsert(
                "test",
                vec![point("b", vec![0.0, 1.0]), point("a", vec![1.0, 0.0])],
            )
            .await
            .unwrap();
        let results = store.search("test", vec![0.0, 0.0], 2).await.unwrap();
        assert_eq!(results[0].id, "b");
        assert_eq!(results[1].id, "a");
    }

    #[tokio::test]
    async fn upsert_replaces_existing_point() {
        let store = InMemoryVectorStore::new();
        store.ensure_collection("test", 2).await.unwrap();
        store
            .upsert("test", vec![point("a", vec![5.0, 5.0])])
            .await
            .unwrap();
        store
            .upsert("test", vec![point("a", vec![0.0, 0.0])])
            .await
            .unwrap();
        let results = store.search("test", vec![0.0, 0.0], 10).await.unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].distance.unwrap().abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn upsert_rejects_wrong_dimension() {
        let store = InMemoryVectorStore::new();
        store.ensure_collection("test", 3).await.unwrap();
        let err = store
            .upsert("test", vec![point("a", vec![1.0])])
            .await
            .unwrap_err();
        assert!(matches!(err, VectorStoreError::Upsert(_)));
    }

    #[tokio::test]
    async fn search_missing_collection_errors() {
        let store = InMemoryVectorStore::new();
        let err = store.search("nope", vec![1.0], 5).await.unwrap_err();
        assert!(matches!(err, VectorStoreError::Search(_)));
    }

    #[test]
    fn euclidean_distance_basic() {
        assert!((euclidean_distance(&[0.0, 0.0], &[3.0, 4.0]) - 5.0).abs() < f32::EPSILON);
    }

    #[test]
    fn debug_format() {
        let store = InMemoryVectorStore::new();
        assert!(format!("{store:?}").contains("InMemoryVectorStore"));
    }
}

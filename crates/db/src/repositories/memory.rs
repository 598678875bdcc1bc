use tokio::sync::RwLock;

use botdesk_core::domain::request::{RequestId, SubmittedRequest};

use super::{RepositoryError, RequestRepository};

#[derive(Default)]
pub struct InMemoryRequestRepository {
    requests: RwLock<Vec<SubmittedRequest>>,
}

#[async_trait::async_trait]
impl RequestRepository for InMemoryRequestRepository {
    async fn save(&self, request: SubmittedRequest) -> Result<(), RepositoryError> {
        let mut requests = self.requests.write().await;
        requests.push(request);
        Ok(())
    }

    async fn find_by_id(&self, id: &RequestId) -> Result<Option<SubmittedRequest>, RepositoryError> {
        let requests = self.requests.read().await;
        Ok(requests.iter().find(|request| &request.id == id).cloned())
    }

    async fn list_recent(&self, limit: u32) -> Result<Vec<SubmittedRequest>, RepositoryError> {
        let mut recent = self.list_all().await?;
        recent.truncate(limit as usize);
        Ok(recent)
    }

    async fn list_all(&self) -> Result<Vec<SubmittedRequest>, RepositoryError> {
        let requests = self.requests.read().await;
        let mut ordered: Vec<(usize, &SubmittedRequest)> = requests.iter().enumerate().collect();
        ordered.sort_by(|(a_pos, a), (b_pos, b)| {
            b.created_at.cmp(&a.created_at).then_with(|| b_pos.cmp(a_pos))
        });
        Ok(ordered.into_iter().map(|(_, request)| request.clone()).collect())
    }

    async fn count(&self) -> Result<u64, RepositoryError> {
        Ok(self.requests.read().await.len() as u64)
    }
}

//! # 프로필 리포지토리
//!
//! 프로필의 원본 저장소입니다. 캐시는 이 리포지토리를 감싸는 쪽(메모이제이션된 조회 뷰)이 담당하므로
//! 여기서는 문서 저장소에 직접 읽고 씁니다.
//!
//! 원본 저장소의 실패는 캐시 실패와 달리 숨기지 않고 `AppError::DatabaseError` 로 반환합니다.

use std::sync::Arc;

use crate::core::errors::AppError;
use crate::db::document_store::DocumentStore;
use crate::domain::profile::Profile;
use crate::utils::clock::Clock;

const PROFILE_COLLECTION: &str = "profiles";

pub struct ProfileRepository {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
}

impl ProfileRepository {
    pub fn new(store: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn find_by_user_id(&self, user_id: &str) -> Result<Option<Profile>, AppError> {
        let document = self
            .store
            .find_active(PROFILE_COLLECTION, user_id, self.clock.now())
            .await
            .map_err(|e| AppError::DatabaseError(format!("프로필 조회 실패: {}", e)))?;

        match document {
            Some(document) => serde_json::from_value(document.data)
                .map(Some)
                .map_err(|e| AppError::DatabaseError(format!("프로필 문서 형식 오류: {}", e))),
            None => Ok(None),
        }
    }

    /// 저장된 프로필이 없으면 기본 프로필을 반환합니다 (저장하지 않음).
    pub async fn find_or_placeholder(&self, user_id: &str) -> Result<Profile, AppError> {
        Ok(self
            .find_by_user_id(user_id)
            .await?
            .unwrap_or_else(|| Profile::placeholder(user_id, self.clock.now())))
    }

    pub async fn save(&self, profile: &Profile) -> Result<(), AppError> {
        let data = serde_json::to_value(profile)
            .map_err(|e| AppError::InternalError(format!("프로필 직렬화 실패: {}", e)))?;

        self.store
            .upsert(PROFILE_COLLECTION, &profile.user_id, &data, None)
            .await
            .map_err(|e| AppError::DatabaseError(format!("프로필 저장 실패: {}", e)))?;

        log::debug!("프로필 저장 - 사용자: {}", profile.user_id);
        Ok(())
    }
}

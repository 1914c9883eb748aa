//! 사용자 프로필
//!
//! 메모이제이션 되는 읽기 뷰(`GET /api/v1/me/profile`)와
//! 관계 기반 무효화를 일으키는 쓰기(`PUT /api/v1/me/profile`)의 대상입니다.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// 문서 저장소에 저장되는 프로필
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    /// 아직 저장된 프로필이 없는 사용자의 기본 프로필
    pub fn placeholder(user_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            display_name: format!("user_{}", user_id),
            bio: None,
            avatar_url: None,
            updated_at: now,
        }
    }

    pub fn apply(&mut self, request: UpdateProfileRequest, now: DateTime<Utc>) {
        if let Some(display_name) = request.display_name {
            self.display_name = display_name;
        }
        if let Some(bio) = request.bio {
            self.bio = Some(bio).filter(|b| !b.is_empty());
        }
        if let Some(avatar_url) = request.avatar_url {
            self.avatar_url = Some(avatar_url).filter(|u| !u.is_empty());
        }
        self.updated_at = now;
    }
}

/// 프로필 수정 요청
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 50, message = "표시 이름은 1-50자 사이여야 합니다"))]
    pub display_name: Option<String>,

    #[validate(length(max = 500, message = "소개는 500자 이하여야 합니다"))]
    pub bio: Option<String>,

    #[validate(url(message = "유효한 URL 을 입력해주세요"))]
    pub avatar_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_updates_only_given_fields() {
        let now = Utc::now();
        let mut profile = Profile::placeholder("42", now);
        profile.bio = Some("hello".to_string());

        profile.apply(
            UpdateProfileRequest {
                display_name: Some("Alice".to_string()),
                bio: None,
                avatar_url: None,
            },
            now,
        );

        assert_eq!(profile.display_name, "Alice");
        assert_eq!(profile.bio.as_deref(), Some("hello"));
    }

    #[test]
    fn test_update_request_validation() {
        let too_long = UpdateProfileRequest {
            display_name: Some("a".repeat(51)),
            bio: None,
            avatar_url: None,
        };
        assert!(too_long.validate().is_err());

        let bad_url = UpdateProfileRequest {
            display_name: None,
            bio: None,
            avatar_url: Some("not a url".to_string()),
        };
        assert!(bad_url.validate().is_err());

        let ok = UpdateProfileRequest {
            display_name: Some("Alice".to_string()),
            bio: Some(String::new()),
            avatar_url: Some("https://cdn.example.com/a.png".to_string()),
        };
        assert!(ok.validate().is_ok());
    }
}

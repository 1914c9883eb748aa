//! # 관계 기반 캐시 무효화
//!
//! 엔티티가 변경되면 그 엔티티 자신의 키뿐 아니라, 그 데이터로부터 파생된
//! 다른 캐시 뷰(목록, 카운트, 연관 엔티티)도 함께 지워야 합니다.
//! 이 모듈은 그 관계를 변경 지점마다 흩어 두지 않고 [`RelationshipTable`] 한 곳에 선언합니다.
//! 새 캐시 뷰를 추가할 때는 규칙 하나만 추가하면 됩니다.
//!
//! ## 패턴 템플릿
//!
//! 템플릿은 `{id}` 와 컨텍스트 필드 `{field}` 자리표시자를 가집니다.
//!
//! ```text
//! post:list:topic_{topic_id}*   + {topic_id: 3}  →  post:list:topic_3*
//! ```
//!
//! 필요한 필드가 컨텍스트에 없으면 그 패턴 하나만 건너뜁니다 (경고 로그).
//! 와일드카드(`*`, `?`, `[`)가 있는 패턴은 SCAN 기반 패턴 삭제로,
//! 없는 패턴은 단일 키 삭제로 처리합니다.
//!
//! ## 캐시 장애
//!
//! 캐시를 사용할 수 없으면 모든 무효화 호출은 0을 반환하는 no-op 입니다.
//! 같은 장애 동안 읽기도 모두 미스이므로 오래된 데이터가 제공되지 않습니다.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Display;
use std::sync::Arc;

use crate::caching::client::CacheClient;
use crate::utils::glob::has_wildcard;

/// 템플릿에 채워 넣을 컨텍스트 필드
#[derive(Debug, Clone, Default)]
pub struct InvalidationContext {
    fields: BTreeMap<String, String>,
}

impl InvalidationContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// 필드를 추가합니다.
    ///
    /// ```rust,ignore
    /// let ctx = InvalidationContext::new().with("topic_id", 3).with("author_id", "u1");
    /// ```
    pub fn with(mut self, field: impl Into<String>, value: impl Display) -> Self {
        self.fields.insert(field.into(), value.to_string());
        self
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }
}

/// 엔티티 타입 하나의 무효화 규칙
#[derive(Debug, Clone, Default)]
pub struct RelationshipRule {
    /// 엔티티 자신에서 파생된 키
    pub direct: Vec<String>,
    /// 컨텍스트 필드가 필요한 연관 뷰
    pub related: Vec<String>,
    /// `invalidate_related`에서만 적용되는 하위 엔티티 캐시
    pub cascade: Vec<String>,
}

impl RelationshipRule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn direct(mut self, patterns: &[&str]) -> Self {
        self.direct.extend(patterns.iter().map(|p| p.to_string()));
        self
    }

    pub fn related(mut self, patterns: &[&str]) -> Self {
        self.related.extend(patterns.iter().map(|p| p.to_string()));
        self
    }

    pub fn cascade(mut self, patterns: &[&str]) -> Self {
        self.cascade.extend(patterns.iter().map(|p| p.to_string()));
        self
    }
}

/// 엔티티 타입 → 무효화 규칙
#[derive(Debug, Clone, Default)]
pub struct RelationshipTable {
    rules: HashMap<String, RelationshipRule>,
}

impl RelationshipTable {
    pub fn empty() -> Self {
        Self::default()
    }

    /// 규칙을 등록합니다. 같은 타입의 기존 규칙은 교체됩니다.
    pub fn register(&mut self, entity_type: impl Into<String>, rule: RelationshipRule) -> &mut Self {
        self.rules.insert(entity_type.into(), rule);
        self
    }

    pub fn rule(&self, entity_type: &str) -> Option<&RelationshipRule> {
        self.rules.get(entity_type)
    }

    /// 소셜 플랫폼 기본 관계
    ///
    /// - user → 프로필, 친구 목록, 작성한 콘텐츠 목록
    /// - topic → 토픽 목록, 소속 게시글
    /// - post → 소속 토픽, 댓글
    /// - comment → 소속 게시글의 댓글 목록
    /// - friendship → 양쪽 사용자의 친구 목록
    /// - notification → 수신자의 알림 목록
    pub fn social_defaults() -> Self {
        let mut table = Self::empty();

        table
            .register(
                "user",
                RelationshipRule::new()
                    .direct(&["user:{id}:*", "user:profile:{id}"])
                    .related(&["friends:user:{id}*", "user:list*"])
                    .cascade(&["topic:list:user_{id}*", "post:list:user_{id}*", "comment:list:user_{id}*"]),
            )
            .register(
                "topic",
                RelationshipRule::new()
                    .direct(&["topic:{id}:*", "topic:list*"])
                    .related(&["user:{author_id}:topics*"])
                    .cascade(&["post:list:topic_{id}*", "post:topic_{id}:*"]),
            )
            .register(
                "post",
                RelationshipRule::new()
                    .direct(&["post:{id}:*", "post:list*"])
                    .related(&["topic:{topic_id}", "post:list:topic_{topic_id}*", "comment:list:post_{id}*"])
                    .cascade(&["comment:list:post_{id}*", "comment:post_{id}:*"]),
            )
            .register(
                "comment",
                RelationshipRule::new()
                    .direct(&["comment:{id}:*"])
                    .related(&["comment:list:post_{post_id}*", "post:{post_id}"]),
            )
            .register(
                "friendship",
                RelationshipRule::new().related(&["friends:user:{user_id}*", "friends:user:{friend_id}*"]),
            )
            .register(
                "notification",
                RelationshipRule::new().related(&[
                    "notification:list:user_{user_id}*",
                    "notification:unread:user_{user_id}",
                ]),
            );

        table
    }
}

/// 템플릿의 자리표시자를 채웁니다. 빠진 필드가 있으면 그 필드 이름을 에러로 돌려줍니다.
fn render_template(template: &str, id: &str, context: &InvalidationContext) -> Result<String, String> {
    let mut rendered = String::with_capacity(template.len() + id.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        rendered.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            rendered.push_str(&rest[open..]);
            return Ok(rendered);
        };

        let field = &after[..close];
        match field {
            "id" => rendered.push_str(id),
            _ => match context.get(field) {
                Some(value) => rendered.push_str(value),
                None => return Err(field.to_string()),
            },
        }
        rest = &after[close + 1..];
    }

    rendered.push_str(rest);
    Ok(rendered)
}

/// 관계 기반 캐시 무효화기
pub struct CacheInvalidator {
    cache: Arc<CacheClient>,
    table: RelationshipTable,
}

impl CacheInvalidator {
    pub fn new(cache: Arc<CacheClient>, table: RelationshipTable) -> Self {
        Self { cache, table }
    }

    pub fn table(&self) -> &RelationshipTable {
        &self.table
    }

    /// 엔티티 자신의 키(`{type}:{id}`)와 `direct`, `related` 패턴을 모두 삭제합니다.
    pub async fn invalidate_entity(&self, entity_type: &str, id: &str, context: &InvalidationContext) -> u64 {
        if !self.cache.is_available() {
            log::debug!("캐시 사용 불가 - 무효화 생략: {}:{}", entity_type, id);
            return 0;
        }

        let mut patterns = vec![format!("{}:{}", entity_type, id)];
        if let Some(rule) = self.table.rule(entity_type) {
            patterns.extend(self.render_all(entity_type, id, rule.direct.iter().chain(&rule.related), context));
        } else {
            log::debug!("등록된 관계 규칙 없음: {}", entity_type);
        }

        let deleted = self.delete_all(&patterns).await;
        log::info!("🗑️ 엔티티 캐시 무효화 - {}:{} ({}개 키)", entity_type, id, deleted);
        deleted
    }

    /// `invalidate_entity` 후 하위 엔티티 캐시(`cascade`)까지 삭제합니다.
    ///
    /// 토픽은 소속 게시글, 게시글은 댓글, 사용자는 작성한 콘텐츠 목록으로 전파됩니다.
    pub async fn invalidate_related(&self, entity_type: &str, id: &str, context: &InvalidationContext) -> u64 {
        let mut deleted = self.invalidate_entity(entity_type, id, context).await;
        if !self.cache.is_available() {
            return deleted;
        }

        if let Some(rule) = self.table.rule(entity_type) {
            let patterns: Vec<String> = self.render_all(entity_type, id, rule.cascade.iter(), context).collect();
            deleted += self.delete_all(&patterns).await;
        }
        deleted
    }

    /// 임의 패턴 무효화 (예: 사용자 X 의 모든 캐시)
    pub async fn invalidate_pattern(&self, pattern: &str) -> u64 {
        if !self.cache.is_available() {
            return 0;
        }
        self.cache.delete_pattern(pattern).await
    }

    fn render_all<'a>(
        &'a self,
        entity_type: &'a str,
        id: &'a str,
        templates: impl Iterator<Item = &'a String> + 'a,
        context: &'a InvalidationContext,
    ) -> impl Iterator<Item = String> + 'a {
        templates.filter_map(move |template| match render_template(template, id, context) {
            Ok(pattern) => Some(pattern),
            Err(field) => {
                log::warn!(
                    "무효화 패턴 건너뜀 - 엔티티: {}, 패턴: {}, 누락된 필드: {}",
                    entity_type,
                    template,
                    field
                );
                None
            }
        })
    }

    async fn delete_all(&self, patterns: &[String]) -> u64 {
        let mut deleted = 0;
        let mut seen = std::collections::HashSet::new();

        for pattern in patterns {
            if !seen.insert(pattern.as_str()) {
                continue;
            }
            if has_wildcard(pattern) {
                deleted += self.cache.delete_pattern(pattern).await;
            } else if self.cache.delete(pattern).await {
                deleted += 1;
            }
        }
        deleted
    }
}

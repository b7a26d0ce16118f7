//! Fixed category sets for profile tagging.

/// Top-level administrative regions.
pub const REGION_CATEGORIES: [&str; 16] = [
    "서울", "경기", "인천", "부산", "대구", "광주", "대전", "울산", "강원", "충북", "충남", "전북",
    "전남", "경북", "경남", "제주",
];

/// Job-field categories. The last entry is the catch-all.
pub const FIELD_CATEGORIES: [&str; 8] = [
    "요양보호", "경비", "청소", "운전", "사무", "상담", "교육", "기타",
];

pub const FIELD_FALLBACK: &str = "기타";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    Region,
    Field,
}

impl TagKind {
    pub fn categories(self) -> &'static [&'static str] {
        match self {
            Self::Region => &REGION_CATEGORIES,
            Self::Field => &FIELD_CATEGORIES,
        }
    }

    fn subject(self) -> &'static str {
        match self {
            Self::Region => "지역명",
            Self::Field => "희망분야명",
        }
    }

    /// Classification prompt for `input`.
    pub fn prompt(self, input: &str) -> String {
        let categories = self.categories().join(", ");
        format!(
            "아래의 {subject}을 내가 제공한 대분류 중 하나만 선택해서 대분류명만 한 단어로 출력해줘.\n\
             - 대분류: {categories}\n\
             - 입력: \"{input}\"\n\
             - 답변은 반드시 대분류 중 하나만 선택해서 쌍따옴표 없이 한글로 출력해.",
            subject = self.subject(),
        )
    }

    /// Map a model reply onto a category.
    ///
    /// Regions with no match yield `None`; fields fall back to [`FIELD_FALLBACK`].
    pub fn resolve(self, reply: &str) -> Option<String> {
        let cleaned = reply
            .trim()
            .trim_matches(|c: char| c == '"' || c == '\'' || c == '.' || c.is_whitespace());

        let found = self
            .categories()
            .iter()
            .find(|c| **c == cleaned)
            .or_else(|| self.categories().iter().find(|c| cleaned.contains(**c)));

        match (found, self) {
            (Some(category), _) => Some((*category).to_string()),
            (None, Self::Field) => Some(FIELD_FALLBACK.to_string()),
            (None, Self::Region) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_exact_and_quoted() {
        assert_eq!(TagKind::Region.resolve("서울"), Some("서울".to_string()));
        assert_eq!(TagKind::Region.resolve(" \"부산\" "), Some("부산".to_string()));
        assert_eq!(TagKind::Field.resolve("운전."), Some("운전".to_string()));
    }

    #[test]
    fn test_resolve_contained() {
        assert_eq!(
            TagKind::Region.resolve("답변: 경기"),
            Some("경기".to_string())
        );
    }

    #[test]
    fn test_resolve_unknown() {
        assert_eq!(TagKind::Region.resolve("화성"), None);
        assert_eq!(TagKind::Field.resolve("우주비행"), Some("기타".to_string()));
    }

    #[test]
    fn test_prompt_lists_categories() {
        let prompt = TagKind::Field.prompt("아파트 경비");
        assert!(prompt.contains("요양보호, 경비, 청소"));
        assert!(prompt.contains("\"아파트 경비\""));
    }
}

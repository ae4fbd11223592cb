//! 매칭 선호 조건

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// 와일드카드 값
pub const ANY: &str = "any";

/// 클라이언트가 보낸 필터 조건 (예: `{"country": "kr", "gender": "any", "minAge": 18}`)
///
/// 값은 임의의 JSON이다. `null`과 `"any"`는 와일드카드로 취급한다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Preferences(BTreeMap<String, Value>);

impl Preferences {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// 양쪽 모두 지정한 키 중 어느 쪽도 와일드카드가 아닌 경우 값이 같아야 호환.
    /// 대칭 관계이므로 호출 순서와 무관하다.
    pub fn is_compatible_with(&self, other: &Preferences) -> bool {
        self.0.iter().all(|(key, mine)| match other.0.get(key) {
            Some(theirs) if !is_wildcard(mine) && !is_wildcard(theirs) => mine == theirs,
            _ => true,
        })
    }
}

fn is_wildcard(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s == ANY,
        _ => false,
    }
}

//! 세션 시리얼 컬렉션.
//!
//! 채택 순서를 유지하고 같은 번호는 한 번만 담는다.

use serialscan_core::models::scan::{Position, ScannedSerial};
use serialscan_core::models::serial::SerialNumber;

/// 중복 없는 시리얼 목록 (채택 순서)
#[derive(Debug, Clone, Default)]
pub struct SerialCollection {
    entries: Vec<ScannedSerial>,
}

impl SerialCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// 새 번호면 현재 시각/위치로 추가. 중복이면 아무것도 하지 않고 `false`
    pub fn try_add(&mut self, number: SerialNumber, location: Option<Position>) -> bool {
        if self.contains(&number) {
            return false;
        }
        self.entries.push(ScannedSerial::new(number, location));
        true
    }

    /// 인덱스 위치 항목 삭제 (범위 밖이면 `None`)
    pub fn remove(&mut self, index: usize) -> Option<ScannedSerial> {
        (index < self.entries.len()).then(|| self.entries.remove(index))
    }

    /// 번호로 삭제
    pub fn remove_number(&mut self, number: &SerialNumber) -> Option<ScannedSerial> {
        let index = self.entries.iter().position(|s| &s.number == number)?;
        Some(self.entries.remove(index))
    }

    pub fn contains(&self, number: &SerialNumber) -> bool {
        self.entries.iter().any(|s| &s.number == number)
    }

    pub fn get(&self, index: usize) -> Option<&ScannedSerial> {
        self.entries.get(index)
    }

    /// 가장 최근에 채택된 항목
    pub fn last(&self) -> Option<&ScannedSerial> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScannedSerial> {
        self.entries.iter()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// 현재 목록 복사본
    pub fn snapshot(&self) -> Vec<ScannedSerial> {
        self.entries.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn serial(n: &str) -> SerialNumber {
        SerialNumber::parse(n).unwrap()
    }

    #[test]
    fn duplicate_is_rejected_silently() {
        let mut collection = SerialCollection::new();
        assert!(collection.try_add(serial("2310211025"), None));
        assert!(!collection.try_add(serial("2310211025"), None));
        assert_eq!(collection.len(), 1);
    }

    #[test]
    fn keeps_acceptance_order_and_location() {
        let mut collection = SerialCollection::new();
        let here = Position {
            lat: 43.65,
            lng: -79.38,
            accuracy: 12.0,
        };
        collection.try_add(serial("1111111111"), Some(here));
        collection.try_add(serial("2222222222"), None);

        let numbers: Vec<&str> = collection.iter().map(|s| s.number.as_str()).collect();
        assert_eq!(numbers, ["1111111111", "2222222222"]);
        assert_eq!(collection.get(0).unwrap().location, Some(here));
        assert_eq!(collection.last().unwrap().location, None);
    }

    #[test]
    fn remove_by_index() {
        let mut collection = SerialCollection::new();
        collection.try_add(serial("1111111111"), None);
        collection.try_add(serial("2222222222"), None);

        assert!(collection.remove(5).is_none());
        let removed = collection.remove(0).unwrap();
        assert_eq!(removed.number.as_str(), "1111111111");
        assert_eq!(collection.len(), 1);

        // 삭제된 번호는 다시 채택 가능
        assert!(collection.try_add(serial("1111111111"), None));
        assert_eq!(collection.snapshot().len(), 2);

        let other = collection.remove_number(&serial("2222222222")).unwrap();
        assert_eq!(other.number.as_str(), "2222222222");
        assert!(collection.remove_number(&serial("2222222222")).is_none());

        collection.clear();
        assert!(collection.is_empty());
    }
}

//! 編集ログ
//!
//! スクリプト実行中の変更は即座に本文へ書かず、ここに積んでおき、
//! スクリプト完了後にまとめて反映する。abort 時はログごと破棄する
//! ことで all-or-nothing を成立させる。

use crate::buffer::Range;
use crate::error::ExecError;

/// ログエントリの種別
#[derive(Debug, Clone, PartialEq)]
enum Entry {
    Insert { q0: usize, text: Vec<char> },
    Delete { q0: usize, q1: usize },
    Replace { q0: usize, q1: usize, text: Vec<char> },
}

impl Entry {
    fn start(&self) -> usize {
        match self {
            Entry::Insert { q0, .. } => *q0,
            Entry::Delete { q0, .. } => *q0,
            Entry::Replace { q0, .. } => *q0,
        }
    }

    fn end(&self) -> usize {
        match self {
            Entry::Insert { q0, .. } => *q0,
            Entry::Delete { q1, .. } => *q1,
            Entry::Replace { q1, .. } => *q1,
        }
    }

    /// 反映後の文字数差分
    fn delta(&self) -> i64 {
        match self {
            Entry::Insert { text, .. } => text.len() as i64,
            Entry::Delete { q0, q1 } => *q0 as i64 - *q1 as i64,
            Entry::Replace { q0, q1, text } => {
                text.len() as i64 + *q0 as i64 - *q1 as i64
            }
        }
    }

    fn inserted_len(&self) -> usize {
        match self {
            Entry::Insert { text, .. } => text.len(),
            Entry::Delete { .. } => 0,
            Entry::Replace { text, .. } => text.len(),
        }
    }
}

/// 遅延反映される編集ログ
///
/// エントリは位置の昇順でしか積めない。逆順に反映することで、
/// 記録時の位置が最後まで有効であり続ける。
#[derive(Debug, Default)]
pub struct EditLog {
    entries: Vec<Entry>,
}

impl EditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn push(&mut self, entry: Entry) -> Result<(), ExecError> {
        if let Some(last) = self.entries.last() {
            if entry.start() < last.end() {
                return Err(ExecError::OutOfSequence);
            }
        }
        self.entries.push(entry);
        Ok(())
    }

    /// q0 の位置に挿入を積む
    pub fn insert(&mut self, q0: usize, text: &str) -> Result<(), ExecError> {
        if text.is_empty() {
            return Ok(());
        }
        self.push(Entry::Insert { q0, text: text.chars().collect() })
    }

    /// [q0, q1) の削除を積む
    pub fn delete(&mut self, q0: usize, q1: usize) -> Result<(), ExecError> {
        if q0 == q1 {
            return Ok(());
        }
        self.push(Entry::Delete { q0, q1 })
    }

    /// [q0, q1) の置換を積む
    pub fn replace(&mut self, q0: usize, q1: usize, text: &str) -> Result<(), ExecError> {
        self.push(Entry::Replace { q0, q1, text: text.chars().collect() })
    }

    /// ログ全体を破棄する
    pub fn truncate(&mut self) {
        self.entries.clear();
    }

    /// ログを本文へ反映し、最後の変更の反映後レンジを返す
    ///
    /// 空のログなら None。反映後、ログは空になる。
    pub fn apply(&mut self, text: &mut Vec<char>) -> Option<Range> {
        if self.entries.is_empty() {
            return None;
        }
        for entry in self.entries.iter().rev() {
            match entry {
                Entry::Insert { q0, text: ins } => {
                    let _ = text.splice(*q0..*q0, ins.iter().copied());
                }
                Entry::Delete { q0, q1 } => {
                    let _ = text.splice(*q0..*q1, std::iter::empty());
                }
                Entry::Replace { q0, q1, text: ins } => {
                    let _ = text.splice(*q0..*q1, ins.iter().copied());
                }
            }
        }
        // 末尾エントリの位置を、それより前のエントリの差分でずらす
        let last = self.entries.last().unwrap();
        let shift: i64 = self.entries[..self.entries.len() - 1]
            .iter()
            .map(Entry::delta)
            .sum();
        let q0 = (last.start() as i64 + shift).max(0) as usize;
        let q1 = q0 + last.inserted_len();
        self.entries.clear();
        Some(Range::new(q0, q1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    fn text(v: &[char]) -> String {
        v.iter().collect()
    }

    #[test]
    fn deferred_edits_apply_in_order() {
        let mut log = EditLog::new();
        let mut buf = chars("hello world\n");
        log.insert(0, ">> ").unwrap();
        log.replace(6, 11, "tsumugi").unwrap();
        let dot = log.apply(&mut buf).unwrap();
        assert_eq!(text(&buf), ">> hello tsumugi\n");
        // 末尾エントリの反映後レンジ（先行挿入の3文字分ずれる）
        assert_eq!(dot, Range::new(9, 16));
        assert!(log.is_empty());
    }

    #[test]
    fn out_of_order_edit_is_rejected() {
        let mut log = EditLog::new();
        log.delete(5, 8).unwrap();
        let err = log.insert(2, "x").unwrap_err();
        assert_eq!(err, ExecError::OutOfSequence);
    }

    #[test]
    fn inserts_at_the_same_point_are_allowed() {
        let mut log = EditLog::new();
        let mut buf = chars("ab");
        log.insert(1, "x").unwrap();
        log.insert(1, "y").unwrap();
        log.apply(&mut buf);
        assert_eq!(text(&buf), "axyb");
    }

    #[test]
    fn truncate_discards_everything() {
        let mut log = EditLog::new();
        let mut buf = chars("abc");
        log.delete(0, 3).unwrap();
        log.truncate();
        assert!(log.apply(&mut buf).is_none());
        assert_eq!(text(&buf), "abc");
    }

    #[test]
    fn empty_edits_are_ignored() {
        let mut log = EditLog::new();
        log.insert(0, "").unwrap();
        log.delete(2, 2).unwrap();
        assert!(log.is_empty());
    }
}

//! 編集セッション
//!
//! 呼び出しをまたいで生き続けるパターンメモリを保持する。
//! プロセス寿命のグローバル状態を明示的なコンテキストとして渡す設計。

/// スクリプト実行をまたぐセッション状態
///
/// 空パターン（`//` など）は直前に使われたパターンとして解決される。
/// カーソル状態はスクリプト毎に作り直されるのに対し、こちらは
/// セッション（プロセス）の寿命を持つ。
#[derive(Debug, Default)]
pub struct EditSession {
    last_pattern: String,
    pattern_set: bool,
}

impl EditSession {
    /// 未設定状態のセッションを作成
    pub fn new() -> Self {
        Self::default()
    }

    /// 最後に使われたパターンを記録する（空文字列は無視）
    pub fn remember_pattern(&mut self, pattern: &str) {
        if !pattern.is_empty() {
            self.last_pattern = pattern.to_string();
            self.pattern_set = true;
        }
    }

    /// 記録済みパターン（未設定なら空文字列）
    pub fn last_pattern(&self) -> &str {
        &self.last_pattern
    }

    /// これまでに一度でもパターンが設定されたか
    pub fn pattern_ever_set(&self) -> bool {
        self.pattern_set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_pattern_is_not_remembered() {
        let mut session = EditSession::new();
        session.remember_pattern("");
        assert!(!session.pattern_ever_set());
        assert_eq!(session.last_pattern(), "");
    }

    #[test]
    fn last_pattern_survives_updates() {
        let mut session = EditSession::new();
        session.remember_pattern("foo");
        session.remember_pattern("");
        assert_eq!(session.last_pattern(), "foo");
        session.remember_pattern("bar");
        assert_eq!(session.last_pattern(), "bar");
        assert!(session.pattern_ever_set());
    }
}

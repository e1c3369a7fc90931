//! バッファ管理
//!
//! 名前つきテキストバッファの集まり（ワークスペース）と、
//! バッファごとの選択・マーク・編集ログ・スナップショット履歴。
//! 本文は文字（rune）単位でアドレスされる。

pub mod elog;

pub use elog::EditLog;

use crate::error::{FileError, Result};

/// バッファ識別子
pub type BufferId = usize;

/// 文字オフセットの半開区間 [q0, q1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Range {
    pub q0: usize,
    pub q1: usize,
}

impl Range {
    pub fn new(q0: usize, q1: usize) -> Self {
        Self { q0, q1 }
    }

    /// 幅ゼロのレンジ
    pub fn empty(at: usize) -> Self {
        Self { q0: at, q1: at }
    }

    pub fn len(&self) -> usize {
        self.q1.saturating_sub(self.q0)
    }

    pub fn is_empty(&self) -> bool {
        self.q1 <= self.q0
    }
}

/// Undo用のスナップショット（スクリプト単位の全体保存）
#[derive(Debug, Clone)]
struct Snapshot {
    text: Vec<char>,
    dot: Range,
    modified: bool,
}

/// 名前つきテキストバッファ
#[derive(Debug)]
pub struct TextBuffer {
    id: BufferId,
    name: String,
    text: Vec<char>,
    /// 現在の選択（dot）
    pub dot: Range,
    /// マーク（`'` アドレスの解決先）
    pub mark: Range,
    /// 遅延反映の編集ログ
    pub elog: EditLog,
    /// 反映済みの変更があるか
    pub modified: bool,
    /// ビューの再描画が必要か
    pub dirty: bool,
    /// 全体書き出し済みで、反映後にフラグを落としてよいか
    pub editclean: bool,
    undo_stack: Vec<Snapshot>,
    redo_stack: Vec<Snapshot>,
}

impl TextBuffer {
    fn new(id: BufferId, name: &str, content: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            text: content.chars().collect(),
            dot: Range::default(),
            mark: Range::default(),
            elog: EditLog::new(),
            modified: false,
            dirty: false,
            editclean: false,
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
        }
    }

    pub fn id(&self) -> BufferId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    /// 文字数
    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// 本文全体
    pub fn content(&self) -> String {
        self.text.iter().collect()
    }

    /// 位置 i の文字
    pub fn char_at(&self, i: usize) -> Option<char> {
        self.text.get(i).copied()
    }

    /// レンジの本文（端はバッファ長に切り詰める）
    pub fn slice(&self, r: Range) -> String {
        let q0 = r.q0.min(self.text.len());
        let q1 = r.q1.min(self.text.len()).max(q0);
        self.text[q0..q1].iter().collect()
    }

    /// 位置 pos を含む行の行番号（1始まり）
    pub fn line_of(&self, pos: usize) -> usize {
        let pos = pos.min(self.text.len());
        1 + self.text[..pos].iter().filter(|&&c| c == '\n').count()
    }

    /// 行番号 n（1始まり）の行全体のレンジ
    ///
    /// n == 0 は先頭の幅ゼロレンジ。存在しない行は None。
    pub fn line_range(&self, n: usize) -> Option<Range> {
        if n == 0 {
            return Some(Range::empty(0));
        }
        let mut line = 1;
        let mut i = 0;
        while line < n && i < self.text.len() {
            if self.text[i] == '\n' {
                line += 1;
            }
            i += 1;
        }
        if line < n {
            return None;
        }
        if i >= self.text.len() {
            // EOFちょうど: 改行終端（または空バッファ）なら空行として扱う
            if self.text.is_empty() || self.text.last() == Some(&'\n') {
                return Some(Range::empty(self.text.len()));
            }
            return None;
        }
        let start = i;
        let mut end = i;
        while end < self.text.len() {
            end += 1;
            if self.text[end - 1] == '\n' {
                break;
            }
        }
        Some(Range::new(start, end))
    }

    /// 位置 pos を含む行全体のレンジ
    pub fn line_span(&self, pos: usize) -> Range {
        let pos = pos.min(self.text.len());
        let mut start = pos;
        while start > 0 && self.text[start - 1] != '\n' {
            start -= 1;
        }
        let mut end = pos;
        while end < self.text.len() {
            end += 1;
            if self.text[end - 1] == '\n' {
                break;
            }
        }
        Range::new(start, end)
    }

    /// 選択とマークをバッファ長の範囲に収める
    pub fn clamp_selections(&mut self) {
        let len = self.text.len();
        self.dot.q0 = self.dot.q0.min(len);
        self.dot.q1 = self.dot.q1.min(len).max(self.dot.q0);
        self.mark.q0 = self.mark.q0.min(len);
        self.mark.q1 = self.mark.q1.min(len).max(self.mark.q0);
    }

    /// 現在状態をUndoスタックへ積む（新しい編集でRedoは消える）
    pub fn push_snapshot(&mut self) {
        self.undo_stack.push(Snapshot {
            text: self.text.clone(),
            dot: self.dot,
            modified: self.modified,
        });
        self.redo_stack.clear();
    }

    /// 直前のスナップショットへ戻す
    pub fn undo(&mut self) -> bool {
        match self.undo_stack.pop() {
            Some(snap) => {
                self.redo_stack.push(Snapshot {
                    text: std::mem::replace(&mut self.text, snap.text),
                    dot: std::mem::replace(&mut self.dot, snap.dot),
                    modified: std::mem::replace(&mut self.modified, snap.modified),
                });
                self.dirty = true;
                true
            }
            None => false,
        }
    }

    /// Undoの取り消し
    pub fn redo(&mut self) -> bool {
        match self.redo_stack.pop() {
            Some(snap) => {
                self.undo_stack.push(Snapshot {
                    text: std::mem::replace(&mut self.text, snap.text),
                    dot: std::mem::replace(&mut self.dot, snap.dot),
                    modified: std::mem::replace(&mut self.modified, snap.modified),
                });
                self.dirty = true;
                true
            }
            None => false,
        }
    }

    /// 編集ログを本文へ反映する（Workspaceのapply経路から呼ぶ）
    pub(crate) fn apply_elog(&mut self) {
        if self.elog.is_empty() {
            return;
        }
        self.push_snapshot();
        if let Some(dot) = self.elog.apply(&mut self.text) {
            self.dot = dot;
        }
        self.modified = true;
        self.dirty = true;
        self.clamp_selections();
    }
}

/// 編集対象バッファの集まり
///
/// スクリプト実行の対象追跡・出力の収集・バッファ横断の
/// ブロードキャストを担う。
#[derive(Debug, Default)]
pub struct Workspace {
    buffers: Vec<TextBuffer>,
    next_id: BufferId,
    /// 現在のコマンド対象
    pub(crate) cur: Option<BufferId>,
    /// p や = が書き出すスクリプト出力
    pub(crate) output: String,
    /// x/y ループの入れ子深さ（スクリプト毎にリセット）
    pub(crate) loop_depth: usize,
    /// スクリプト実行中フラグ
    pub(crate) editing: bool,
}

impl Workspace {
    pub fn new() -> Self {
        Self::default()
    }

    /// 内容つきのバッファを開く
    pub fn open(&mut self, name: &str, content: &str) -> BufferId {
        let id = self.next_id;
        self.next_id += 1;
        self.buffers.push(TextBuffer::new(id, name, content));
        if self.cur.is_none() {
            self.cur = Some(id);
        }
        id
    }

    /// ファイルを読み込んでバッファを開く
    pub fn open_file(&mut self, path: &str) -> Result<BufferId> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| FileError::from_io(path, &e))?;
        Ok(self.open(path, &content))
    }

    pub fn buffer(&self, id: BufferId) -> Option<&TextBuffer> {
        self.buffers.iter().find(|b| b.id == id)
    }

    pub fn buffer_mut(&mut self, id: BufferId) -> Option<&mut TextBuffer> {
        self.buffers.iter_mut().find(|b| b.id == id)
    }

    /// 名前の一致するバッファを探す
    pub fn find_by_name(&self, name: &str) -> Option<BufferId> {
        self.buffers.iter().find(|b| b.name == name).map(|b| b.id)
    }

    /// 開いている順のバッファID一覧
    pub fn ids(&self) -> Vec<BufferId> {
        self.buffers.iter().map(|b| b.id).collect()
    }

    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    /// バッファを閉じる
    pub fn close(&mut self, id: BufferId) {
        self.buffers.retain(|b| b.id != id);
        if self.cur == Some(id) {
            self.cur = self.buffers.first().map(|b| b.id);
        }
    }

    /// 現在のコマンド対象
    pub fn current(&self) -> Option<BufferId> {
        self.cur
    }

    pub fn set_current(&mut self, id: Option<BufferId>) {
        self.cur = id;
    }

    /// 実行中か
    pub fn is_editing(&self) -> bool {
        self.editing
    }

    /// 溜まったスクリプト出力を取り出す
    pub fn take_output(&mut self) -> String {
        std::mem::take(&mut self.output)
    }

    pub(crate) fn push_output(&mut self, s: &str) {
        self.output.push_str(s);
    }

    pub(crate) fn buffers_mut(&mut self) -> impl Iterator<Item = &mut TextBuffer> {
        self.buffers.iter_mut()
    }

    pub(crate) fn buffers(&self) -> impl Iterator<Item = &TextBuffer> {
        self.buffers.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_lookup_matches_content() {
        let mut ws = Workspace::new();
        let id = ws.open("t", "one\ntwo\nthree\n");
        let buf = ws.buffer(id).unwrap();

        assert_eq!(buf.line_range(0), Some(Range::empty(0)));
        assert_eq!(buf.line_range(1), Some(Range::new(0, 4)));
        assert_eq!(buf.line_range(2), Some(Range::new(4, 8)));
        assert_eq!(buf.line_range(3), Some(Range::new(8, 14)));
        // 改行終端なら行4はちょうどEOFの空行
        assert_eq!(buf.line_range(4), Some(Range::empty(14)));
        assert_eq!(buf.line_range(5), None);

        assert_eq!(buf.line_of(0), 1);
        assert_eq!(buf.line_of(4), 2);
        assert_eq!(buf.line_of(13), 3);
        assert_eq!(buf.line_span(5), Range::new(4, 8));
    }

    #[test]
    fn unterminated_last_line_is_addressable() {
        let mut ws = Workspace::new();
        let id = ws.open("t", "one\ntwo");
        let buf = ws.buffer(id).unwrap();
        assert_eq!(buf.line_range(2), Some(Range::new(4, 7)));
        assert_eq!(buf.line_range(3), None);
    }

    #[test]
    fn undo_and_redo_roundtrip() {
        let mut ws = Workspace::new();
        let id = ws.open("t", "before");
        let buf = ws.buffer_mut(id).unwrap();
        buf.elog.replace(0, 6, "after").unwrap();
        buf.apply_elog();
        assert_eq!(buf.content(), "after");
        assert!(buf.modified);

        assert!(buf.undo());
        assert_eq!(buf.content(), "before");
        assert!(!buf.modified);

        assert!(buf.redo());
        assert_eq!(buf.content(), "after");
        assert!(buf.undo());
        assert!(!buf.undo());
    }

    #[test]
    fn closing_current_buffer_moves_to_first_remaining() {
        let mut ws = Workspace::new();
        let a = ws.open("a", "");
        let b = ws.open("b", "");
        assert_eq!(ws.current(), Some(a));
        ws.close(a);
        assert_eq!(ws.current(), Some(b));
        ws.close(b);
        assert_eq!(ws.current(), None);
    }
}

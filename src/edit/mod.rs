//! 構造編集コマンド言語
//!
//! アドレス文法・コマンド構文解析・実行ハーネスの統合モジュール。
//! 文字文法（`# l / ? " . $ + - ' , ;`、コマンド文字、`{ }`）は
//! 互換性のためビット単位で固定されている。

pub mod address;
pub mod collect;
pub mod command;
pub mod cursor;
pub mod engine;
pub mod session;

// 公開API
pub use address::{Addr, AddrKind};
pub use command::{parse_script, Cmd, CmdC, CmdDesc, CountArity, DefAddr, ExecCap};
pub use cursor::{ScriptCursor, SignPolicy};
pub use engine::{run_script, EditHost, Flow};
pub use session::EditSession;

/// スクリプト構文解析器
///
/// カーソル（スクリプト毎）とセッション（プロセス寿命のパターン
/// メモリ）を束ねる。解析器は1スクリプトずつ使い捨てる。
pub struct ScriptParser<'s> {
    pub(crate) cursor: ScriptCursor,
    pub(crate) session: &'s mut EditSession,
}

impl<'s> ScriptParser<'s> {
    /// スクリプトに対する解析器を作成
    pub fn new(session: &'s mut EditSession, script: &str) -> Self {
        Self {
            cursor: ScriptCursor::new(script),
            session,
        }
    }
}

//! コマンド構文解析
//!
//! コマンド文字をキーとする静的ディスクリプタ表に従う再帰下降
//! 解析器。ブレースブロックの入れ子、既定サブコマンドの合成、
//! `cd` の2文字畳み込みを扱う。

use std::fmt;

use super::address::Addr;
use super::collect::ok_delim;
use super::session::EditSession;
use super::ScriptParser;
use crate::error::ScriptError;

/// 行末のみで終端するトークン
pub const LINEX: &[char] = &['\n'];
/// タブまたは行末で終端するトークン
pub const WORDX: &[char] = &['\t', '\n'];

/// コマンドコード
///
/// 通常は1文字。`c` の直後に `d` が続いた場合のみ、独立した
/// 2文字コードに畳み込まれる（歴史的な特例）。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmdC {
    Ch(char),
    ChangeDir,
}

impl fmt::Display for CmdC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CmdC::Ch('\n') => write!(f, "\\n"),
            CmdC::Ch(c) => write!(f, "{c}"),
            CmdC::ChangeDir => write!(f, "cd"),
        }
    }
}

/// アドレス省略時の既定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefAddr {
    /// アドレス不可
    None,
    /// 現在の選択
    Dot,
    /// バッファ全体
    All,
}

/// 数値カウントのアリティ
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountArity {
    None,
    /// 符号なしカウント（s2/// 等）
    Unsigned,
    /// 符号つきカウント（u-1 等）
    Signed,
}

/// 外部エグゼキュータの能力参照
///
/// 表の行が指すエグゼキュータの族。複数のコマンド文字が同じ族を
/// 共有する（r→e、t→m、v→g、y→x、Y→X）。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecCap {
    Newline,
    Append,
    BufferSwitch,
    Change,
    Delete,
    Edit,
    Filename,
    Guard,
    Insert,
    Move,
    Print,
    Subst,
    Undo,
    Write,
    Loop,
    PrintAddr,
    BufferLoad,
    BufferClose,
    FileLoop,
    Pipe,
}

/// コマンドディスクリプタ（1文字分の文法要件）
pub struct CmdDesc {
    pub cmdc: char,
    /// テキストボディを取るか
    pub text: bool,
    /// 正規表現を取るか
    pub regexp: bool,
    /// 第二アドレス（m/t）を取るか
    pub addr: bool,
    /// 既定サブコマンド文字
    pub defcmd: Option<char>,
    /// アドレス省略時の既定
    pub defaddr: DefAddr,
    /// 数値カウント
    pub count: CountArity,
    /// 裸トークンの終端集合
    pub token: Option<&'static [char]>,
    /// エグゼキュータ能力
    pub exec: ExecCap,
}

/// コマンド表
///
/// 文字文法の一部であり、並びも内容も固定。
pub static CMDTAB: &[CmdDesc] = &[
    CmdDesc { cmdc: '\n', text: false, regexp: false, addr: false, defcmd: None, defaddr: DefAddr::Dot, count: CountArity::None, token: None, exec: ExecCap::Newline },
    CmdDesc { cmdc: 'a', text: true, regexp: false, addr: false, defcmd: None, defaddr: DefAddr::Dot, count: CountArity::None, token: None, exec: ExecCap::Append },
    CmdDesc { cmdc: 'b', text: false, regexp: false, addr: false, defcmd: None, defaddr: DefAddr::None, count: CountArity::None, token: Some(LINEX), exec: ExecCap::BufferSwitch },
    CmdDesc { cmdc: 'c', text: true, regexp: false, addr: false, defcmd: None, defaddr: DefAddr::Dot, count: CountArity::None, token: None, exec: ExecCap::Change },
    CmdDesc { cmdc: 'd', text: false, regexp: false, addr: false, defcmd: None, defaddr: DefAddr::Dot, count: CountArity::None, token: None, exec: ExecCap::Delete },
    CmdDesc { cmdc: 'e', text: false, regexp: false, addr: false, defcmd: None, defaddr: DefAddr::None, count: CountArity::None, token: Some(WORDX), exec: ExecCap::Edit },
    CmdDesc { cmdc: 'f', text: false, regexp: false, addr: false, defcmd: None, defaddr: DefAddr::None, count: CountArity::None, token: Some(WORDX), exec: ExecCap::Filename },
    CmdDesc { cmdc: 'g', text: false, regexp: true, addr: false, defcmd: Some('p'), defaddr: DefAddr::Dot, count: CountArity::None, token: None, exec: ExecCap::Guard },
    CmdDesc { cmdc: 'i', text: true, regexp: false, addr: false, defcmd: None, defaddr: DefAddr::Dot, count: CountArity::None, token: None, exec: ExecCap::Insert },
    CmdDesc { cmdc: 'm', text: false, regexp: false, addr: true, defcmd: None, defaddr: DefAddr::Dot, count: CountArity::None, token: None, exec: ExecCap::Move },
    CmdDesc { cmdc: 'p', text: false, regexp: false, addr: false, defcmd: None, defaddr: DefAddr::Dot, count: CountArity::None, token: None, exec: ExecCap::Print },
    CmdDesc { cmdc: 'r', text: false, regexp: false, addr: false, defcmd: None, defaddr: DefAddr::Dot, count: CountArity::None, token: Some(WORDX), exec: ExecCap::Edit },
    CmdDesc { cmdc: 's', text: false, regexp: true, addr: false, defcmd: None, defaddr: DefAddr::Dot, count: CountArity::Unsigned, token: None, exec: ExecCap::Subst },
    CmdDesc { cmdc: 't', text: false, regexp: false, addr: true, defcmd: None, defaddr: DefAddr::Dot, count: CountArity::None, token: None, exec: ExecCap::Move },
    CmdDesc { cmdc: 'u', text: false, regexp: false, addr: false, defcmd: None, defaddr: DefAddr::None, count: CountArity::Signed, token: None, exec: ExecCap::Undo },
    CmdDesc { cmdc: 'v', text: false, regexp: true, addr: false, defcmd: Some('p'), defaddr: DefAddr::Dot, count: CountArity::None, token: None, exec: ExecCap::Guard },
    CmdDesc { cmdc: 'w', text: false, regexp: false, addr: false, defcmd: None, defaddr: DefAddr::All, count: CountArity::None, token: Some(WORDX), exec: ExecCap::Write },
    CmdDesc { cmdc: 'x', text: false, regexp: true, addr: false, defcmd: Some('p'), defaddr: DefAddr::Dot, count: CountArity::None, token: None, exec: ExecCap::Loop },
    CmdDesc { cmdc: 'y', text: false, regexp: true, addr: false, defcmd: Some('p'), defaddr: DefAddr::Dot, count: CountArity::None, token: None, exec: ExecCap::Loop },
    CmdDesc { cmdc: '=', text: false, regexp: false, addr: false, defcmd: None, defaddr: DefAddr::Dot, count: CountArity::None, token: Some(LINEX), exec: ExecCap::PrintAddr },
    CmdDesc { cmdc: 'B', text: false, regexp: false, addr: false, defcmd: None, defaddr: DefAddr::None, count: CountArity::None, token: Some(LINEX), exec: ExecCap::BufferLoad },
    CmdDesc { cmdc: 'D', text: false, regexp: false, addr: false, defcmd: None, defaddr: DefAddr::None, count: CountArity::None, token: Some(LINEX), exec: ExecCap::BufferClose },
    CmdDesc { cmdc: 'X', text: false, regexp: true, addr: false, defcmd: Some('f'), defaddr: DefAddr::None, count: CountArity::None, token: None, exec: ExecCap::FileLoop },
    CmdDesc { cmdc: 'Y', text: false, regexp: true, addr: false, defcmd: Some('f'), defaddr: DefAddr::None, count: CountArity::None, token: None, exec: ExecCap::FileLoop },
    CmdDesc { cmdc: '<', text: false, regexp: false, addr: false, defcmd: None, defaddr: DefAddr::Dot, count: CountArity::None, token: Some(LINEX), exec: ExecCap::Pipe },
    CmdDesc { cmdc: '|', text: false, regexp: false, addr: false, defcmd: None, defaddr: DefAddr::Dot, count: CountArity::None, token: Some(LINEX), exec: ExecCap::Pipe },
    CmdDesc { cmdc: '>', text: false, regexp: false, addr: false, defcmd: None, defaddr: DefAddr::Dot, count: CountArity::None, token: Some(LINEX), exec: ExecCap::Pipe },
];

/// コマンドコードからディスクリプタを引く
pub fn lookup(cmdc: CmdC) -> Option<&'static CmdDesc> {
    match cmdc {
        CmdC::Ch(c) => CMDTAB.iter().find(|d| d.cmdc == c),
        CmdC::ChangeDir => None,
    }
}

/// コマンド木のノード
///
/// `cmd` が入れ子（ブロック本体・既定サブコマンド）、`next` が
/// ブロック内の兄弟連鎖。どちらも親が一意に所有する。
#[derive(Debug, Clone, PartialEq)]
pub struct Cmd {
    /// 適用対象のアドレス木
    pub addr: Option<Box<Addr>>,
    /// 主正規表現
    pub re: Option<String>,
    /// 入れ子コマンド
    pub cmd: Option<Box<Cmd>>,
    /// テキストボディ（a/c/i の本文、s の置換側、裸トークン）
    pub text: Option<String>,
    /// 第二アドレス（m/t の移動先）
    pub mtaddr: Option<Box<Addr>>,
    /// 兄弟コマンド
    pub next: Option<Box<Cmd>>,
    /// 数値カウント
    pub num: i64,
    /// グローバル置換フラグ文字
    pub flag: Option<char>,
    /// コマンドコード
    pub cmdc: CmdC,
}

impl Cmd {
    pub(crate) fn new(cmdc: CmdC) -> Self {
        Self {
            addr: None,
            re: None,
            cmd: None,
            text: None,
            mtaddr: None,
            next: None,
            num: 0,
            flag: None,
            cmdc,
        }
    }
}

impl<'s> ScriptParser<'s> {
    /// トップレベルまたは入れ子のコマンドを1つ解析する
    ///
    /// 入力が尽きたら None。ブロック内では閉じブレースも None を
    /// 返して呼び出し側に知らせる。
    pub(crate) fn parse_cmd(&mut self, nest: usize) -> Result<Option<Box<Cmd>>, ScriptError> {
        let addr = self.compound_addr()?;
        if self.cursor.skip_blanks().is_none() {
            return Ok(None);
        }
        let c = match self.cursor.getch() {
            Some(c) => c,
            None => return Ok(None),
        };
        let mut cmd = Cmd::new(CmdC::Ch(c));
        cmd.addr = addr;
        if c == 'c' && self.cursor.nextc() == Some('d') {
            self.cursor.getch();
            cmd.cmdc = CmdC::ChangeDir;
        }

        match lookup(cmd.cmdc) {
            Some(ct) => {
                if cmd.cmdc == CmdC::Ch('\n') {
                    // 行末コマンドはエグゼキュータが全て処理する
                    return Ok(Some(Box::new(cmd)));
                }
                if ct.defaddr == DefAddr::None && cmd.addr.is_some() {
                    return Err(ScriptError::TakesNoAddress);
                }
                if ct.count != CountArity::None {
                    cmd.num = self.cursor.get_num(ct.count.sign_policy());
                }
                if ct.regexp {
                    // パターンなしの x は行ごと、X は全ファイルを意味する
                    let peeked = self.cursor.nextc();
                    let exempt = (ct.cmdc == 'x' || ct.cmdc == 'X')
                        && matches!(peeked, Some(' ') | Some('\t') | Some('\n'));
                    if !exempt {
                        self.cursor.skip_blanks();
                        let delim = match self.cursor.getch() {
                            None | Some('\n') => return Err(ScriptError::NoAddress),
                            Some(d) => d,
                        };
                        ok_delim(delim)?;
                        cmd.re = Some(self.get_regexp(delim)?);
                        if ct.cmdc == 's' {
                            let mut text = String::new();
                            self.get_rhs(&mut text, delim, true);
                            cmd.text = Some(text);
                            if self.cursor.nextc() == Some(delim) {
                                self.cursor.getch();
                                if self.cursor.nextc() == Some('g') {
                                    cmd.flag = self.cursor.getch();
                                }
                            }
                        }
                    }
                }
                cmd.mtaddr = self.simple_addr()?;
                if ct.addr && cmd.mtaddr.is_none() {
                    return Err(ScriptError::BadAddress);
                }
                if let Some(defc) = ct.defcmd {
                    if self.cursor.skip_blanks() == Some('\n') {
                        self.cursor.getch();
                        cmd.cmd = Some(Box::new(Cmd::new(CmdC::Ch(defc))));
                    } else {
                        match self.parse_cmd(nest)? {
                            Some(sub) => cmd.cmd = Some(sub),
                            None => panic!("defcmd"),
                        }
                    }
                } else if ct.text {
                    cmd.text = Some(self.collect_text()?);
                } else if let Some(token) = ct.token {
                    cmd.text = Some(self.collect_token(token)?);
                } else {
                    self.cursor.expect_newline()?;
                }
            }
            None => match cmd.cmdc {
                CmdC::Ch('{') => {
                    let mut parts: Vec<Box<Cmd>> = Vec::new();
                    loop {
                        if self.cursor.skip_blanks() == Some('\n') {
                            self.cursor.getch();
                        }
                        match self.parse_cmd(nest + 1)? {
                            Some(sub) => parts.push(sub),
                            None => break,
                        }
                    }
                    // 後ろから繋ぎ直して兄弟連鎖を作る
                    let mut chained: Option<Box<Cmd>> = None;
                    while let Some(mut sub) = parts.pop() {
                        sub.next = chained.take();
                        chained = Some(sub);
                    }
                    cmd.cmd = chained;
                }
                CmdC::Ch('}') => {
                    self.cursor.expect_newline()?;
                    if nest == 0 {
                        return Err(ScriptError::UnbalancedBrace);
                    }
                    return Ok(None);
                }
                other => {
                    return Err(ScriptError::UnknownCommand(other.to_string()));
                }
            },
        }
        Ok(Some(Box::new(cmd)))
    }
}

impl CountArity {
    fn sign_policy(self) -> super::cursor::SignPolicy {
        match self {
            CountArity::Signed => super::cursor::SignPolicy::Signed,
            _ => super::cursor::SignPolicy::Unsigned,
        }
    }
}

/// スクリプト全体をコマンド列として解析する
///
/// 実行ハーネスは1コマンドずつ解析と実行を交互に行うが、こちらは
/// 検査やベンチマーク向けに木だけを組み立てる。
pub fn parse_script(
    session: &mut EditSession,
    script: &str,
) -> Result<Vec<Box<Cmd>>, ScriptError> {
    let mut parser = ScriptParser::new(session, script);
    let mut cmds = Vec::new();
    while let Some(cmd) = parser.parse_cmd(0)? {
        cmds.push(cmd);
    }
    Ok(cmds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edit::address::AddrKind;

    fn parse(input: &str) -> Result<Vec<Box<Cmd>>, ScriptError> {
        let mut session = EditSession::new();
        parse_script(&mut session, input)
    }

    fn parse_one(input: &str) -> Box<Cmd> {
        let mut cmds = parse(input).unwrap();
        assert_eq!(cmds.len(), 1, "expected one command from {input:?}");
        cmds.remove(0)
    }

    #[test]
    fn blank_line_parses_to_newline_command() {
        // 空入力の早期リターンはハーネス側の仕事で、
        // 解析器は正規化された空行を行末コマンドとして返す
        let cmds = parse("   \n").unwrap();
        assert_eq!(cmds.len(), 1);
        assert_eq!(cmds[0].cmdc, CmdC::Ch('\n'));
    }

    #[test]
    fn simple_commands_parse() {
        let cmd = parse_one("p\n");
        assert_eq!(cmd.cmdc, CmdC::Ch('p'));
        assert!(cmd.addr.is_none());

        let cmd = parse_one("3,5d\n");
        assert_eq!(cmd.cmdc, CmdC::Ch('d'));
        assert_eq!(cmd.addr.as_ref().unwrap().kind, AddrKind::Comma);
    }

    #[test]
    fn newline_is_a_command_of_its_own() {
        let cmd = parse_one("5\n");
        assert_eq!(cmd.cmdc, CmdC::Ch('\n'));
        assert_eq!(cmd.addr.as_ref().unwrap().kind, AddrKind::Line);
    }

    #[test]
    fn unknown_command_is_reported() {
        let err = parse("z\n").unwrap_err();
        assert_eq!(err.to_string(), "unknown command z");
    }

    #[test]
    fn cd_folds_into_two_char_code() {
        let err = parse("cd /tmp\n").unwrap_err();
        assert_eq!(err.to_string(), "unknown command cd");
    }

    #[test]
    fn address_on_addressless_command_is_rejected() {
        let err = parse("5u\n").unwrap_err();
        assert_eq!(err.to_string(), "command takes no address");
    }

    #[test]
    fn close_brace_at_top_level_is_rejected() {
        let err = parse("}\n").unwrap_err();
        assert_eq!(err.to_string(), "right brace with no left brace");
    }

    #[test]
    fn substitution_parses_pattern_body_and_flag() {
        let cmd = parse_one("s/x+/y/g\n");
        assert_eq!(cmd.cmdc, CmdC::Ch('s'));
        assert_eq!(cmd.re.as_deref(), Some("x+"));
        assert_eq!(cmd.text.as_deref(), Some("y"));
        assert_eq!(cmd.flag, Some('g'));
        assert_eq!(cmd.num, 1);

        let cmd = parse_one("s2/x/y/\n");
        assert_eq!(cmd.num, 2);
        assert_eq!(cmd.flag, None);
    }

    #[test]
    fn substitution_without_closing_delimiter_has_no_flag() {
        let cmd = parse_one("s/x/y\n");
        assert_eq!(cmd.text.as_deref(), Some("y"));
        assert_eq!(cmd.flag, None);
    }

    #[test]
    fn alnum_delimiter_is_rejected() {
        let err = parse("sXxXyX\n").unwrap_err();
        assert_eq!(err.to_string(), "bad delimiter X");
    }

    #[test]
    fn missing_pattern_is_an_error() {
        let err = parse("s\n").unwrap_err();
        assert_eq!(err.to_string(), "no address");
    }

    #[test]
    fn text_body_round_trip() {
        let cmd = parse_one("a\nhello\nworld\n.\n");
        assert_eq!(cmd.text.as_deref(), Some("hello\nworld\n"));

        let cmd = parse_one("i/head /\n");
        assert_eq!(cmd.text.as_deref(), Some("head "));
    }

    #[test]
    fn move_requires_target_address() {
        let err = parse("m\n").unwrap_err();
        assert_eq!(err.to_string(), "bad address");

        let cmd = parse_one("m$\n");
        assert_eq!(cmd.mtaddr.as_ref().unwrap().kind, AddrKind::End);
    }

    #[test]
    fn guard_synthesizes_default_subcommand() {
        let cmd = parse_one("g/foo/\n");
        assert_eq!(cmd.cmdc, CmdC::Ch('g'));
        let sub = cmd.cmd.as_ref().unwrap();
        assert_eq!(sub.cmdc, CmdC::Ch('p'));

        let cmd = parse_one("v/foo/ d\n");
        assert_eq!(cmd.cmd.as_ref().unwrap().cmdc, CmdC::Ch('d'));
    }

    #[test]
    fn loop_without_pattern_is_allowed() {
        let cmd = parse_one("x d\n");
        assert_eq!(cmd.re, None);
        assert_eq!(cmd.cmd.as_ref().unwrap().cmdc, CmdC::Ch('d'));

        // y にはパターンが必須
        let err = parse("y\n").unwrap_err();
        assert_eq!(err.to_string(), "no address");
    }

    #[test]
    fn brace_block_chains_siblings() {
        let cmd = parse_one("{\np\n5d\n}\n");
        assert_eq!(cmd.cmdc, CmdC::Ch('{'));
        let first = cmd.cmd.as_ref().unwrap();
        assert_eq!(first.cmdc, CmdC::Ch('p'));
        let second = first.next.as_ref().unwrap();
        assert_eq!(second.cmdc, CmdC::Ch('d'));
        assert!(second.next.is_none());
    }

    #[test]
    fn empty_brace_block_has_no_nested_commands() {
        let cmd = parse_one("{\n}\n");
        assert!(cmd.cmd.is_none());
    }

    #[test]
    fn nested_blocks_parse() {
        let cmd = parse_one("{\n{\np\n}\n}\n");
        let inner = cmd.cmd.as_ref().unwrap();
        assert_eq!(inner.cmdc, CmdC::Ch('{'));
        assert_eq!(inner.cmd.as_ref().unwrap().cmdc, CmdC::Ch('p'));
    }

    #[test]
    fn reparse_is_idempotent() {
        let script = "1,$x/foo/ {\ns/a/b/g\np\n}\n";
        let mut session = EditSession::new();
        let first = parse_script(&mut session, script).unwrap();
        let second = parse_script(&mut session, script).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn doubled_separator_in_command_address() {
        let err = parse("3,,p\n").unwrap_err();
        assert_eq!(err.to_string(), "bad address syntax");
    }
}

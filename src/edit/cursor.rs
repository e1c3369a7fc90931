//! スクリプトカーソル
//!
//! 正規化済みスクリプトバッファ上の1文字プッシュバック付きリーダ
//! 構文解析器全体が共有する唯一の読み取り状態

use crate::error::ScriptError;

/// 数値読み取り時の符号の扱い
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignPolicy {
    /// 符号なし（先頭の '-' を消費しない）
    Unsigned,
    /// 符号つき（先頭の '-' を許す）
    Signed,
}

/// 正規化済みスクリプト上の読み取りカーソル
///
/// バッファは必ず改行で終わる。プッシュバックは1文字分だけ保証され、
/// 読み取りを挟まずに2回戻すのは呼び出し側のバグとして panic する。
pub struct ScriptCursor {
    buf: Vec<char>,
    pos: usize,
    pushed: bool,
}

impl ScriptCursor {
    /// スクリプトからカーソルを作成（末尾に改行が無ければ補う）
    pub fn new(script: &str) -> Self {
        let mut buf: Vec<char> = script.chars().collect();
        if buf.last() != Some(&'\n') {
            buf.push('\n');
        }
        Self { buf, pos: 0, pushed: false }
    }

    /// 次の1文字を消費して返す（入力末尾では None、位置は進まない）
    pub fn getch(&mut self) -> Option<char> {
        if self.pos == self.buf.len() {
            return None;
        }
        let c = self.buf[self.pos];
        self.pos += 1;
        self.pushed = false;
        Some(c)
    }

    /// 次の1文字を消費せずに返す
    pub fn nextc(&self) -> Option<char> {
        self.buf.get(self.pos).copied()
    }

    /// 直前に読んだ1文字を戻す
    ///
    /// 読み取りを挟まない連続呼び出しと、先頭より前への後退は
    /// 文法実装のバグであり回復しない。
    pub fn ungetch(&mut self) {
        if self.pushed || self.pos == 0 {
            panic!("ungetch");
        }
        self.pos -= 1;
        self.pushed = true;
    }

    /// 空白（スペース・タブ）を読み飛ばし、最初の非空白文字を返す
    ///
    /// 返した文字は入力末尾でない限り戻されるので、続けて読み直せる。
    pub fn skip_blanks(&mut self) -> Option<char> {
        let mut c;
        loop {
            c = self.getch();
            if !matches!(c, Some(' ') | Some('\t')) {
                break;
            }
        }
        if c.is_some() {
            self.ungetch();
        }
        c
    }

    /// 行末（空白の後の改行）を要求する
    pub fn expect_newline(&mut self) -> Result<(), ScriptError> {
        self.skip_blanks();
        let c = self.getch();
        if c != Some('\n') {
            return Err(ScriptError::NewlineExpected(describe_char(c)));
        }
        Ok(())
    }

    /// 10進数を読み取る
    ///
    /// 符号つきポリシーでは先頭の '-' を1つ消費する。数字が続かない
    /// 場合は符号のみを大きさ1として返す（`#` 単独はオフセット1、
    /// `-` 単独は -1）。読み取り後、数字でない終端文字は戻される。
    pub fn get_num(&mut self, sign: SignPolicy) -> i64 {
        let mut n: i64 = 0;
        let mut sign_val: i64 = 1;

        if sign == SignPolicy::Signed && self.nextc() == Some('-') {
            sign_val = -1;
            self.getch();
        }
        match self.nextc() {
            Some(c) if c.is_ascii_digit() => {}
            _ => return sign_val,
        }

        loop {
            match self.getch() {
                Some(c) if c.is_ascii_digit() => {
                    n = n * 10 + (c as i64 - '0' as i64);
                }
                _ => break,
            }
        }
        self.ungetch();
        sign_val * n
    }
}

/// エラーメッセージ用の文字表示（入力末尾は EOF と表す）
pub(crate) fn describe_char(c: Option<char>) -> String {
    match c {
        Some('\n') => "\\n".to_string(),
        Some(c) => c.to_string(),
        None => "EOF".to_string(),
    }
}

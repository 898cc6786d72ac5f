//! Editing tools, text formatting and date stamping

use crate::object::TextStyle;
use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Tool that decides what a pointer gesture does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tool {
    #[default]
    Select,
    Draw,
    Highlight,
    Redact,
    Text,
    Textbox,
    Date,
    Signature,
}

impl Tool {
    pub const ALL: [Tool; 8] = [
        Tool::Select,
        Tool::Draw,
        Tool::Highlight,
        Tool::Redact,
        Tool::Text,
        Tool::Textbox,
        Tool::Date,
        Tool::Signature,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Tool::Select => "select",
            Tool::Draw => "draw",
            Tool::Highlight => "highlight",
            Tool::Redact => "redact",
            Tool::Text => "text",
            Tool::Textbox => "textbox",
            Tool::Date => "date",
            Tool::Signature => "signature",
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown tool {0:?}")]
pub struct ParseToolError(String);

impl FromStr for Tool {
    type Err = ParseToolError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Tool::ALL
            .into_iter()
            .find(|tool| tool.name().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| ParseToolError(value.to_owned()))
    }
}

/// Session-wide tool selection and text formatting
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ToolState {
    pub active_tool: Tool,
    pub formatting: TextStyle,
}

/// How date stamps are written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateFormat {
    /// `12/25/2024`
    #[default]
    UsLocale,
    /// `2024-12-25`
    Iso,
    /// `25/12/2024`
    European,
    /// `December 25, 2024`
    Long,
}

impl DateFormat {
    pub fn pattern(self) -> &'static str {
        match self {
            DateFormat::UsLocale => "%-m/%-d/%Y",
            DateFormat::Iso => "%Y-%m-%d",
            DateFormat::European => "%d/%m/%Y",
            DateFormat::Long => "%B %-d, %Y",
        }
    }

    pub fn format(self, date: NaiveDate) -> String {
        date.format(self.pattern()).to_string()
    }
}

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Calendar date used for date stamps
    fn today(&self) -> NaiveDate;
}

/// Wall clock in the local time zone
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Clock frozen at one instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }

    fn today(&self) -> NaiveDate {
        self.0.date_naive()
    }
}

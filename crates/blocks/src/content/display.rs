//! Display-only blocks. None of them require validation.

use serde::{Deserialize, Serialize};

use crate::block::{Content, parse_points_into};
use crate::context::BlockContext;
use crate::error::{BlockError, Result};
use crate::input::{self, Input};

fn set_if_present(field: &mut String, input: &Input, key: &str) {
    if let Some(value) = input::first(input, key) {
        *field = value.to_string();
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkdownBlock {
    pub content: String,
}

impl Content for MarkdownBlock {
    const TYPE: &'static str = "markdown";
    const CONTEXTS: &'static [BlockContext] = &[
        BlockContext::LocationContent,
        BlockContext::LocationClues,
        BlockContext::Lobby,
        BlockContext::Finish,
    ];

    fn update(&mut self, points: &mut i32, input: &Input) -> Result<()> {
        parse_points_into(points, input)?;
        set_if_present(&mut self.content, input, "content");
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DividerBlock {
    pub title: String,
}

impl Content for DividerBlock {
    const TYPE: &'static str = "divider";
    const CONTEXTS: &'static [BlockContext] = &[
        BlockContext::LocationContent,
        BlockContext::Lobby,
        BlockContext::Finish,
    ];

    fn update(&mut self, _points: &mut i32, input: &Input) -> Result<()> {
        set_if_present(&mut self.title, input, "title");
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertBlock {
    pub content: String,
    pub variant: String,
}

impl Content for AlertBlock {
    const TYPE: &'static str = "alert";
    const CONTEXTS: &'static [BlockContext] = &[BlockContext::LocationContent];

    fn update(&mut self, _points: &mut i32, input: &Input) -> Result<()> {
        set_if_present(&mut self.content, input, "content");
        set_if_present(&mut self.variant, input, "variant");
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HeaderBlock {
    pub icon: String,
    pub title_text: String,
    /// small, medium or large
    pub title_size: String,
}

impl Content for HeaderBlock {
    const TYPE: &'static str = "header";
    const CONTEXTS: &'static [BlockContext] = &[
        BlockContext::LocationContent,
        BlockContext::Lobby,
        BlockContext::Finish,
    ];

    fn update(&mut self, _points: &mut i32, input: &Input) -> Result<()> {
        let icon = input::first(input, "icon").unwrap_or_default();
        let title = input::first(input, "title_text").unwrap_or_default();
        if icon.is_empty() && title.is_empty() {
            return Err(BlockError::InvalidInput(
                "title text or icon must be provided".to_string(),
            ));
        }
        self.icon = icon.to_string();
        self.title_text = title.to_string();
        set_if_present(&mut self.title_size, input, "title_size");
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageBlock {
    pub url: String,
    pub caption: String,
    pub link: String,
}

impl Content for ImageBlock {
    const TYPE: &'static str = "image";
    const CONTEXTS: &'static [BlockContext] = &[
        BlockContext::LocationContent,
        BlockContext::LocationClues,
        BlockContext::Lobby,
        BlockContext::Finish,
    ];

    fn update(&mut self, _points: &mut i32, input: &Input) -> Result<()> {
        set_if_present(&mut self.url, input, "url");
        set_if_present(&mut self.caption, input, "caption");
        set_if_present(&mut self.link, input, "link");
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ButtonBlock {
    pub link: String,
    pub text: String,
    pub variant: String,
}

impl Content for ButtonBlock {
    const TYPE: &'static str = "button";
    const CONTEXTS: &'static [BlockContext] = &[BlockContext::LocationContent];

    fn update(&mut self, _points: &mut i32, input: &Input) -> Result<()> {
        set_if_present(&mut self.link, input, "link");
        set_if_present(&mut self.text, input, "text");
        set_if_present(&mut self.variant, input, "variant");
        Ok(())
    }
}

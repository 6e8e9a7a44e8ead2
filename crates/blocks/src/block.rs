use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::content::{
    AlertBlock, AnswerBlock, ButtonBlock, ChecklistBlock, ClueBlock, DividerBlock, HeaderBlock,
    ImageBlock, MarkdownBlock, PincodeBlock, QuizBlock, RandomClueBlock, SortingBlock,
};
use crate::context::BlockContext;
use crate::error::{BlockError, Result};
use crate::input::{self, Input};
use crate::state::PlayerState;

/// Behaviour every block type provides. The type owns its configuration schema
/// (serialized as the block's `data`) and its validation of player input.
pub(crate) trait Content: Serialize + DeserializeOwned + Default {
    const TYPE: &'static str;
    const CONTEXTS: &'static [BlockContext];

    fn requires_validation(&self) -> bool {
        false
    }

    /// Apply an admin edit. `points` is the block's base points.
    fn update(&mut self, points: &mut i32, input: &Input) -> Result<()>;

    /// Display-only blocks complete on any interaction.
    fn validate(&self, _points: i32, mut state: PlayerState, _input: &Input) -> Result<PlayerState> {
        state.complete = true;
        Ok(state)
    }
}

/// Persisted form of a block, before its `data` is interpreted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseBlock {
    pub id: String,
    pub owner_id: String,
    pub block_type: String,
    pub context: BlockContext,
    pub data: Value,
    pub order: i32,
    pub points: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BlockKind {
    Markdown(MarkdownBlock),
    Divider(DividerBlock),
    Alert(AlertBlock),
    Header(HeaderBlock),
    Image(ImageBlock),
    Button(ButtonBlock),
    Answer(AnswerBlock),
    Pincode(PincodeBlock),
    Checklist(ChecklistBlock),
    Quiz(QuizBlock),
    Sorting(SortingBlock),
    Clue(ClueBlock),
    RandomClue(RandomClueBlock),
}

macro_rules! dispatch {
    ($kind:expr, $inner:ident => $body:expr) => {
        match $kind {
            BlockKind::Markdown($inner) => $body,
            BlockKind::Divider($inner) => $body,
            BlockKind::Alert($inner) => $body,
            BlockKind::Header($inner) => $body,
            BlockKind::Image($inner) => $body,
            BlockKind::Button($inner) => $body,
            BlockKind::Answer($inner) => $body,
            BlockKind::Pincode($inner) => $body,
            BlockKind::Checklist($inner) => $body,
            BlockKind::Quiz($inner) => $body,
            BlockKind::Sorting($inner) => $body,
            BlockKind::Clue($inner) => $body,
            BlockKind::RandomClue($inner) => $body,
        }
    };
}

/// Block types and the contexts each may appear in.
const REGISTRY: &[(&str, &[BlockContext])] = &[
    (MarkdownBlock::TYPE, MarkdownBlock::CONTEXTS),
    (DividerBlock::TYPE, DividerBlock::CONTEXTS),
    (AlertBlock::TYPE, AlertBlock::CONTEXTS),
    (HeaderBlock::TYPE, HeaderBlock::CONTEXTS),
    (ImageBlock::TYPE, ImageBlock::CONTEXTS),
    (ButtonBlock::TYPE, ButtonBlock::CONTEXTS),
    (AnswerBlock::TYPE, AnswerBlock::CONTEXTS),
    (PincodeBlock::TYPE, PincodeBlock::CONTEXTS),
    (ChecklistBlock::TYPE, ChecklistBlock::CONTEXTS),
    (QuizBlock::TYPE, QuizBlock::CONTEXTS),
    (SortingBlock::TYPE, SortingBlock::CONTEXTS),
    (ClueBlock::TYPE, ClueBlock::CONTEXTS),
    (RandomClueBlock::TYPE, RandomClueBlock::CONTEXTS),
];

fn type_name<T: Content>(_: &T) -> &'static str {
    T::TYPE
}

fn parse<T: Content>(block_type: &str, data: &Value) -> Result<T> {
    if data.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(data.clone())
        .map_err(|e| BlockError::InvalidConfig(format!("{block_type}: {e}")))
}

impl BlockKind {
    fn from_data(block_type: &str, data: &Value) -> Result<Self> {
        let kind = match block_type {
            "markdown" => BlockKind::Markdown(parse(block_type, data)?),
            "divider" => BlockKind::Divider(parse(block_type, data)?),
            "alert" => BlockKind::Alert(parse(block_type, data)?),
            "header" => BlockKind::Header(parse(block_type, data)?),
            "image" => BlockKind::Image(parse(block_type, data)?),
            "button" => BlockKind::Button(parse(block_type, data)?),
            "answer" => BlockKind::Answer(parse(block_type, data)?),
            "pincode" => BlockKind::Pincode(parse(block_type, data)?),
            "checklist" => BlockKind::Checklist(parse(block_type, data)?),
            "quiz_block" => BlockKind::Quiz(parse(block_type, data)?),
            "sorting" => BlockKind::Sorting(parse(block_type, data)?),
            "clue" => BlockKind::Clue(parse(block_type, data)?),
            "random_clue" => BlockKind::RandomClue(parse(block_type, data)?),
            other => return Err(BlockError::UnknownType(other.to_string())),
        };
        Ok(kind)
    }

    pub fn type_name(&self) -> &'static str {
        dispatch!(self, inner => type_name(inner))
    }
}

/// A materialised block.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub id: String,
    pub owner_id: String,
    pub context: BlockContext,
    pub order: i32,
    pub points: i32,
    pub kind: BlockKind,
}

impl Block {
    /// The single constructor from persisted form.
    pub fn create_from_base_block(base: BaseBlock) -> Result<Self> {
        let kind = BlockKind::from_data(&base.block_type, &base.data)?;
        Ok(Self {
            id: base.id,
            owner_id: base.owner_id,
            context: base.context,
            order: base.order,
            points: base.points,
            kind,
        })
    }

    /// A fresh, unconfigured block. Fails when the type is unknown or not
    /// allowed in `context`.
    pub fn new(
        id: impl Into<String>,
        owner_id: impl Into<String>,
        context: BlockContext,
        block_type: &str,
        order: i32,
    ) -> Result<Self> {
        if !Self::supports_context(block_type, context)? {
            return Err(BlockError::UnsupportedContext {
                block_type: block_type.to_string(),
                context,
            });
        }
        Self::create_from_base_block(BaseBlock {
            id: id.into(),
            owner_id: owner_id.into(),
            block_type: block_type.to_string(),
            context,
            data: Value::Null,
            order,
            points: 0,
        })
    }

    /// Whether `block_type` may be placed in `context`.
    pub fn supports_context(block_type: &str, context: BlockContext) -> Result<bool> {
        REGISTRY
            .iter()
            .find(|(name, _)| *name == block_type)
            .map(|(_, contexts)| contexts.contains(&context))
            .ok_or_else(|| BlockError::UnknownType(block_type.to_string()))
    }

    /// Block types usable in `context`, in registry order.
    pub fn types_for_context(context: BlockContext) -> Vec<&'static str> {
        REGISTRY
            .iter()
            .filter(|(_, contexts)| contexts.contains(&context))
            .map(|(name, _)| *name)
            .collect()
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn block_type(&self) -> &'static str {
        self.kind.type_name()
    }

    pub fn order(&self) -> i32 {
        self.order
    }

    pub fn points(&self) -> i32 {
        self.points
    }

    /// Type-specific configuration as JSON.
    pub fn data(&self) -> Result<Value> {
        Ok(dispatch!(&self.kind, inner => serde_json::to_value(inner))?)
    }

    pub fn requires_validation(&self) -> bool {
        dispatch!(&self.kind, inner => inner.requires_validation())
    }

    /// Apply an admin edit to the block's configuration and points.
    pub fn update_block_data(&mut self, input: &Input) -> Result<()> {
        let points = &mut self.points;
        dispatch!(&mut self.kind, inner => inner.update(points, input))
    }

    /// Run player input through the type's validator and return the new state.
    pub fn validate_player_input(&self, state: PlayerState, input: &Input) -> Result<PlayerState> {
        let points = self.points;
        dispatch!(&self.kind, inner => inner.validate(points, state, input))
    }

    /// URL of an uploaded file this block displays, if any.
    pub fn media_url(&self) -> Option<&str> {
        match &self.kind {
            BlockKind::Image(image) if !image.url.is_empty() => Some(image.url.as_str()),
            _ => None,
        }
    }

    pub fn to_base_block(&self) -> Result<BaseBlock> {
        Ok(BaseBlock {
            id: self.id.clone(),
            owner_id: self.owner_id.clone(),
            block_type: self.block_type().to_string(),
            context: self.context,
            data: self.data()?,
            order: self.order,
            points: self.points,
        })
    }
}

pub(crate) fn parse_points_into(points: &mut i32, input: &Input) -> Result<()> {
    if let Some(value) = input::points(input)? {
        *points = value;
    }
    Ok(())
}

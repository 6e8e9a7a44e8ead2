use std::str::FromStr;

use ::blocks::{BaseBlock, Block, BlockContext};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder,
};
use sea_orm::sea_query::Expr;

use crate::entity::blocks::{ActiveModel, Column, Entity, Model};
use crate::error::{Error, Result};

/// Interpret a stored row.
pub fn to_block(model: Model) -> Result<Block> {
    let context = BlockContext::from_str(&model.context)?;
    Ok(Block::create_from_base_block(BaseBlock {
        id: model.id,
        owner_id: model.owner_id,
        block_type: model.block_type,
        context,
        data: model.data,
        order: model.ordering,
        points: model.points,
    })?)
}

pub fn to_model(block: &Block) -> Result<Model> {
    Ok(Model {
        id: block.id.clone(),
        owner_id: block.owner_id.clone(),
        context: block.context.to_string(),
        block_type: block.block_type().to_string(),
        ordering: block.order(),
        data: block.data()?,
        points: block.points(),
        validation_required: block.requires_validation(),
    })
}

fn to_blocks(models: Vec<Model>) -> Result<Vec<Block>> {
    models.into_iter().map(to_block).collect()
}

pub async fn find<C: ConnectionTrait>(db: &C, block_id: &str) -> Result<Option<Block>> {
    Entity::find_by_id(block_id.to_string())
        .one(db)
        .await?
        .map(to_block)
        .transpose()
}

pub async fn get<C: ConnectionTrait>(db: &C, block_id: &str) -> Result<Block> {
    find(db, block_id)
        .await?
        .ok_or_else(|| Error::not_found("Block", block_id))
}

/// Blocks of one owner and context, in display order.
pub async fn find_by_owner<C: ConnectionTrait>(
    db: &C,
    owner_id: &str,
    context: BlockContext,
) -> Result<Vec<Block>> {
    let models = Entity::find()
        .filter(Column::OwnerId.eq(owner_id))
        .filter(Column::Context.eq(context.as_str()))
        .order_by_asc(Column::Ordering)
        .all(db)
        .await?;
    to_blocks(models)
}

pub async fn find_by_owners<C: ConnectionTrait>(
    db: &C,
    owner_ids: Vec<String>,
    context: BlockContext,
) -> Result<Vec<Block>> {
    if owner_ids.is_empty() {
        return Ok(Vec::new());
    }
    let models = Entity::find()
        .filter(Column::OwnerId.is_in(owner_ids))
        .filter(Column::Context.eq(context.as_str()))
        .order_by_asc(Column::OwnerId)
        .order_by_asc(Column::Ordering)
        .all(db)
        .await?;
    to_blocks(models)
}

/// Every row owned by any of `owner_ids`, regardless of context.
pub async fn rows_by_owners<C: ConnectionTrait>(db: &C, owner_ids: Vec<String>) -> Result<Vec<Model>> {
    if owner_ids.is_empty() {
        return Ok(Vec::new());
    }
    Ok(Entity::find()
        .filter(Column::OwnerId.is_in(owner_ids))
        .all(db)
        .await?)
}

/// Whether any content block at the location needs player input.
pub async fn any_requires_validation<C: ConnectionTrait>(db: &C, location_id: &str) -> Result<bool> {
    let count = Entity::find()
        .filter(Column::OwnerId.eq(location_id))
        .filter(Column::Context.eq(BlockContext::LocationContent.as_str()))
        .filter(Column::ValidationRequired.eq(true))
        .count(db)
        .await?;
    Ok(count > 0)
}

pub async fn count_for_owner<C: ConnectionTrait>(
    db: &C,
    owner_id: &str,
    context: BlockContext,
) -> Result<u64> {
    Ok(Entity::find()
        .filter(Column::OwnerId.eq(owner_id))
        .filter(Column::Context.eq(context.as_str()))
        .count(db)
        .await?)
}

pub async fn insert<C: ConnectionTrait>(db: &C, block: &Block) -> Result<()> {
    let active: ActiveModel = to_model(block)?.into();
    active.insert(db).await?;
    Ok(())
}

/// Persist a block's configuration and points.
pub async fn update<C: ConnectionTrait>(db: &C, block: &Block) -> Result<()> {
    let model = to_model(block)?;
    let result = Entity::update_many()
        .col_expr(Column::Data, Expr::value(model.data))
        .col_expr(Column::Points, Expr::value(model.points))
        .col_expr(Column::ValidationRequired, Expr::value(model.validation_required))
        .filter(Column::Id.eq(model.id.as_str()))
        .exec(db)
        .await?;
    if result.rows_affected == 0 {
        return Err(Error::not_found("Block", model.id));
    }
    Ok(())
}

pub async fn set_ordering<C: ConnectionTrait>(db: &C, block_id: &str, ordering: i32) -> Result<()> {
    Entity::update_many()
        .col_expr(Column::Ordering, Expr::value(ordering))
        .filter(Column::Id.eq(block_id))
        .exec(db)
        .await?;
    Ok(())
}

/// Image URLs still shown by blocks outside `excluding`.
pub async fn media_urls_in_use<C: ConnectionTrait>(
    db: &C,
    urls: Vec<String>,
    excluding: Vec<String>,
) -> Result<Vec<String>> {
    if urls.is_empty() {
        return Ok(Vec::new());
    }
    let mut query = Entity::find().filter(Column::BlockType.eq("image"));
    if !excluding.is_empty() {
        query = query.filter(Column::Id.is_not_in(excluding));
    }
    let mut in_use = Vec::new();
    for model in query.all(db).await? {
        let block = to_block(model)?;
        if let Some(url) = block.media_url() {
            if urls.iter().any(|candidate| candidate == url) {
                in_use.push(url.to_string());
            }
        }
    }
    Ok(in_use)
}

pub async fn delete_many<C: ConnectionTrait>(db: &C, block_ids: Vec<String>) -> Result<u64> {
    if block_ids.is_empty() {
        return Ok(0);
    }
    let result = Entity::delete_many()
        .filter(Column::Id.is_in(block_ids))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

/*
 * SPDX-FileCopyrightText: 2025 Wavelens UG <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Deserialize, Serialize)]
#[sea_orm(table_name = "buildkite_config")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub config: Uuid,
    pub org_slug: String,
    pub pipeline_slug: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::project_config::Entity",
        from = "Column::Config",
        to = "super::project_config::Column::Id"
    )]
    ProjectConfig,
}

impl Related<super::project_config::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProjectConfig.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

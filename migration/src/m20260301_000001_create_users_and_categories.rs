use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_query::Expr;

#[derive(DeriveMigrationName)]
pub struct Migration;

/// Static category taxonomy: (slug, name, description, icon).
const CATEGORY_SEED: [(&str, &str, &str, &str); 12] = [
    ("fiscalite", "Fiscalité", "Impôts, taxes et prélèvements", "coins"),
    ("sante", "Santé", "Hôpital, sécurité sociale et prévention", "heart-pulse"),
    ("education", "Éducation", "École, université et formation", "graduation-cap"),
    ("retraites", "Retraites", "Régimes et financement des retraites", "hourglass"),
    ("logement", "Logement", "Loyers, accession et urbanisme", "house"),
    ("transports", "Transports", "Mobilités, infrastructures et carburants", "train"),
    ("environnement", "Environnement", "Climat, énergie et biodiversité", "leaf"),
    ("justice", "Justice", "Fonctionnement de la justice", "scale-balanced"),
    ("securite", "Sécurité", "Police, gendarmerie et défense", "shield"),
    ("culture", "Culture", "Patrimoine, médias et création", "masks-theater"),
    ("institutions", "Institutions", "Démocratie, élus et dépense publique", "landmark"),
    ("autre", "Autre", "Propositions hors catégorie", "ellipsis"),
];

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Users::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Users::Username)
                            .string_len(32)
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(Users::Email)
                            .string_len(254)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Users::DisplayName).string_len(64).null())
                    .col(
                        ColumnDef::new(Users::ContributionLevel)
                            .string_len(32)
                            .not_null()
                            .default("petit_nicolas"),
                    )
                    .col(
                        ColumnDef::new(Users::ReputationScore)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Users::IsModerator)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Users::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Users::LastActiveAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_users_reputation")
                    .table(Users::Table)
                    .col(Users::ReputationScore)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Categories::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Categories::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Categories::Slug)
                            .string_len(32)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Categories::Name).string_len(64).not_null())
                    .col(
                        ColumnDef::new(Categories::Description)
                            .string_len(256)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Categories::Icon).string_len(32).not_null())
                    .col(ColumnDef::new(Categories::SortOrder).integer().not_null())
                    .to_owned(),
            )
            .await?;

        let mut seed = Query::insert()
            .into_table(Categories::Table)
            .columns([
                Categories::Slug,
                Categories::Name,
                Categories::Description,
                Categories::Icon,
                Categories::SortOrder,
            ])
            .to_owned();
        for (index, (slug, name, description, icon)) in CATEGORY_SEED.iter().enumerate() {
            seed.values_panic([
                (*slug).into(),
                (*name).into(),
                (*description).into(),
                (*icon).into(),
                (index as i32 + 1).into(),
            ]);
        }
        manager.exec_stmt(seed).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Categories::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
pub(crate) enum Users {
    Table,
    Id,
    Username,
    Email,
    DisplayName,
    ContributionLevel,
    ReputationScore,
    IsModerator,
    CreatedAt,
    LastActiveAt,
}

#[derive(DeriveIden)]
pub(crate) enum Categories {
    Table,
    Id,
    Slug,
    Name,
    Description,
    Icon,
    SortOrder,
}

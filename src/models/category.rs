use serde::Serialize;

use crate::entities::category;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryView {
    pub id: i32,
    pub slug: String,
    pub name: String,
    pub description: String,
    pub icon: String,
}

impl From<category::Model> for CategoryView {
    fn from(c: category::Model) -> Self {
        Self {
            id: c.id,
            slug: c.slug,
            name: c.name,
            description: c.description,
            icon: c.icon,
        }
    }
}

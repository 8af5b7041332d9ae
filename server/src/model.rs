use notelite_api::{ImageInfo, UserInfo, UserRef};

/// A credential-store row. `password_hash` is an argon2 PHC string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub password_hash: String,
    pub created_at: i64,
}

impl User {
    pub fn info(&self) -> UserInfo {
        UserInfo {
            id: self.id.clone(),
            email: self.email.clone(),
            name: self.name.clone(),
        }
    }

    pub fn user_ref(&self) -> UserRef {
        UserRef {
            name: self.name.clone(),
            email: self.email.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub content: String,
    pub is_public: bool,
    pub created_by: String,
    pub last_edited_by: Option<String>,
    pub created_at: i64,
    pub last_edited_at: i64,
}

/// An image metadata row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub id: String,
    pub filename: String,
    pub original_name: String,
    pub mime_type: String,
    pub size: i64,
    pub document_id: Option<String>,
    pub uploaded_by: String,
    pub created_at: i64,
}

impl Image {
    /// Retrieval path for the stored bytes.
    pub fn url(&self) -> String {
        format!("/images/{}", self.filename)
    }

    pub fn info(&self) -> rusqlite::Result<ImageInfo> {
        Ok(ImageInfo {
            id: self.id.clone(),
            filename: self.filename.clone(),
            original_name: self.original_name.clone(),
            mime_type: self.mime_type.clone(),
            size: self.size,
            document_id: self.document_id.clone(),
            uploaded_by_id: self.uploaded_by.clone(),
            created_at: crate::db::from_millis(self.created_at)?,
        })
    }
}

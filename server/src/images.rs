use crate::{db, error::AppError, model::Image, model::User};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Metadata of an upload that passed validation and whose bytes are on disk.
pub struct NewImage<'a> {
    pub filename: &'a str,
    pub original_name: &'a str,
    pub mime_type: &'a str,
    pub size: i64,
    pub document_id: Option<&'a str>,
}

/// Check the declared type and the byte size of an upload.
///
/// Only the declared mime type decides whether the upload is an image; the
/// file extension is never consulted.
pub fn validate_upload(declared_mime: &str, size: u64, max_bytes: u64) -> Result<(), AppError> {
    if !declared_mime.starts_with("image/") {
        return Err(AppError::InvalidInput("Invalid file type".into()));
    }
    if size > max_bytes {
        return Err(AppError::TooLarge);
    }
    Ok(())
}

const COLUMNS: &str =
    "i.id, i.filename, i.original_name, i.mime_type, i.size, i.document_id, i.uploaded_by, i.created_at";

fn row_to_image(row: &rusqlite::Row<'_>) -> rusqlite::Result<Image> {
    Ok(Image {
        id: row.get(0)?,
        filename: row.get(1)?,
        original_name: row.get(2)?,
        mime_type: row.get(3)?,
        size: row.get(4)?,
        document_id: row.get(5)?,
        uploaded_by: row.get(6)?,
        created_at: row.get(7)?,
    })
}

pub fn insert_image(
    conn: &Connection,
    uploader: &User,
    new: &NewImage<'_>,
) -> Result<Image, AppError> {
    let image = Image {
        id: Uuid::new_v4().to_string(),
        filename: new.filename.into(),
        original_name: new.original_name.into(),
        mime_type: new.mime_type.into(),
        size: new.size,
        document_id: new.document_id.map(Into::into),
        uploaded_by: uploader.id.clone(),
        created_at: db::now_millis(),
    };
    conn.execute(
        "INSERT INTO images (id, filename, original_name, mime_type, size, document_id, uploaded_by, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            image.id,
            image.filename,
            image.original_name,
            image.mime_type,
            image.size,
            image.document_id,
            image.uploaded_by,
            image.created_at
        ],
    )?;
    Ok(image)
}

pub fn find_by_filename(conn: &Connection, filename: &str) -> Result<Option<Image>, AppError> {
    let sql = format!("SELECT {COLUMNS} FROM images i WHERE i.filename = ?1");
    let image = conn
        .query_row(&sql, [filename], row_to_image)
        .optional()?;
    Ok(image)
}

pub fn list_for_document(
    conn: &Connection,
    document_id: &str,
) -> Result<Vec<Image>, AppError> {
    let sql = format!("SELECT {COLUMNS} FROM images i WHERE i.document_id = ?1 ORDER BY i.created_at");
    let mut stmt = conn.prepare(&sql)?;
    let images = stmt
        .query_map([document_id], row_to_image)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(images)
}

/// Images of every document `actor_id` may list, grouped by document id.
pub fn list_for_visible_documents(
    conn: &Connection,
    actor_id: &str,
) -> Result<HashMap<String, Vec<Image>>, AppError> {
    let sql = format!(
        "SELECT {COLUMNS} FROM images i JOIN documents d ON d.id = i.document_id \
         WHERE d.is_public = 1 OR d.created_by = ?1 ORDER BY i.created_at"
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut grouped: HashMap<String, Vec<Image>> = HashMap::new();
    for image in stmt.query_map([actor_id], row_to_image)? {
        let image = image?;
        if let Some(doc_id) = image.document_id.clone() {
            grouped.entry(doc_id).or_default().push(image);
        }
    }
    Ok(grouped)
}

/// Every storage filename that still has a metadata row.
pub fn all_filenames(conn: &Connection) -> Result<HashSet<String>, AppError> {
    let mut stmt = conn.prepare("SELECT filename FROM images")?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<HashSet<_>, _>>()?;
    Ok(names)
}

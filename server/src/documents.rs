use crate::{
    db,
    error::AppError,
    images,
    model::{Document, Image, User},
    policy,
};
use notelite_api::{DocumentPatch, DocumentView, NewDocument, UserRef};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

pub const UNTITLED: &str = "Untitled Document";

/// A document row joined with the display info of its owner and last editor.
struct DocumentRow {
    doc: Document,
    created_by: UserRef,
    last_edited_by: Option<UserRef>,
}

const SELECT_JOINED: &str = "SELECT d.id, d.title, d.content, d.is_public, d.created_by, d.last_edited_by, \
     d.created_at, d.last_edited_at, cu.name, cu.email, eu.name, eu.email \
     FROM documents d \
     JOIN users cu ON cu.id = d.created_by \
     LEFT JOIN users eu ON eu.id = d.last_edited_by";

fn row_to_document(row: &rusqlite::Row<'_>) -> rusqlite::Result<DocumentRow> {
    let doc = Document {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        is_public: row.get::<_, i64>(3)? != 0,
        created_by: row.get(4)?,
        last_edited_by: row.get(5)?,
        created_at: row.get(6)?,
        last_edited_at: row.get(7)?,
    };
    let created_by = UserRef {
        name: row.get(8)?,
        email: row.get(9)?,
    };
    let last_edited_by = row
        .get::<_, Option<String>>(11)?
        .map(|email| -> rusqlite::Result<UserRef> {
            Ok(UserRef {
                name: row.get(10)?,
                email,
            })
        })
        .transpose()?;
    Ok(DocumentRow {
        doc,
        created_by,
        last_edited_by,
    })
}

impl DocumentRow {
    fn into_view(self, images: Vec<Image>) -> rusqlite::Result<DocumentView> {
        Ok(DocumentView {
            created_at: db::from_millis(self.doc.created_at)?,
            last_edited_at: db::from_millis(self.doc.last_edited_at)?,
            id: self.doc.id,
            title: self.doc.title,
            content: self.doc.content,
            is_public: self.doc.is_public,
            created_by_id: self.doc.created_by,
            last_edited_by_id: self.doc.last_edited_by,
            created_by: self.created_by,
            last_edited_by: self.last_edited_by,
            images: images
                .iter()
                .map(Image::info)
                .collect::<rusqlite::Result<Vec<_>>>()?,
        })
    }
}

fn fetch(conn: &Connection, id: &str) -> Result<Option<DocumentRow>, AppError> {
    let sql = format!("{SELECT_JOINED} WHERE d.id = ?1");
    Ok(conn.query_row(&sql, [id], row_to_document).optional()?)
}

/// Fetch the bare document row, without applying any policy.
pub fn find_document(conn: &Connection, id: &str) -> Result<Option<Document>, AppError> {
    Ok(fetch(conn, id)?.map(|row| row.doc))
}

/// Insert a document with a caller-chosen id. `actor` becomes owner and last editor.
pub fn insert_document(
    conn: &Connection,
    id: &str,
    actor: &User,
    title: &str,
    content: &str,
    is_public: bool,
) -> Result<(), AppError> {
    let now = db::now_millis();
    conn.execute(
        "INSERT INTO documents (id, title, content, is_public, created_by, last_edited_by, created_at, last_edited_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?5, ?6, ?6)",
        params![id, title, content, is_public, actor.id, now],
    )?;
    Ok(())
}

/// Create a document owned by `actor`.
///
/// An absent or empty title becomes the placeholder title, content defaults
/// to empty and visibility to private.
pub fn create_document(
    conn: &Connection,
    actor: &User,
    new: NewDocument,
) -> Result<DocumentView, AppError> {
    let id = Uuid::new_v4().to_string();
    let title = new
        .title
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| UNTITLED.to_string());
    let content = new.content.unwrap_or_default();
    insert_document(
        conn,
        &id,
        actor,
        &title,
        &content,
        new.is_public.unwrap_or(false),
    )?;
    let row = fetch(conn, &id)?.ok_or(AppError::DocumentNotFound)?;
    Ok(row.into_view(Vec::new())?)
}

pub fn get_document(conn: &Connection, id: &str, actor: &User) -> Result<DocumentView, AppError> {
    let row = fetch(conn, id)?.ok_or(AppError::DocumentNotFound)?;
    policy::check_read(&row.doc, actor)?;
    let images = images::list_for_document(conn, id)?;
    Ok(row.into_view(images)?)
}

/// Apply a partial update.
///
/// Only the fields present in `patch` are written, and a visibility change is
/// dropped unless `actor` owns the document. The last editor and edit time
/// are stamped even when nothing else changes; the edit time always moves
/// forward by at least one millisecond.
pub fn update_document(
    conn: &Connection,
    id: &str,
    actor: &User,
    patch: DocumentPatch,
) -> Result<DocumentView, AppError> {
    let row = fetch(conn, id)?.ok_or(AppError::DocumentNotFound)?;
    policy::check_edit(&row.doc, actor)?;
    let patch = policy::permitted_patch(&row.doc, actor, patch);
    let changed = conn.execute(
        "UPDATE documents SET \
           title = COALESCE(?2, title), \
           content = COALESCE(?3, content), \
           is_public = COALESCE(?4, is_public), \
           last_edited_by = ?5, \
           last_edited_at = MAX(?6, last_edited_at + 1) \
         WHERE id = ?1",
        params![
            id,
            patch.title,
            patch.content,
            patch.is_public,
            actor.id,
            db::now_millis()
        ],
    )?;
    if changed == 0 {
        return Err(AppError::DocumentNotFound);
    }
    let row = fetch(conn, id)?.ok_or(AppError::DocumentNotFound)?;
    let images = images::list_for_document(conn, id)?;
    Ok(row.into_view(images)?)
}

/// Delete a document owned by `actor`. Image rows go with it through the
/// foreign key cascade; their files are left for the orphan sweep.
pub fn delete_document(conn: &Connection, id: &str, actor: &User) -> Result<(), AppError> {
    let row = fetch(conn, id)?.ok_or(AppError::DocumentNotFound)?;
    policy::check_delete(&row.doc, actor)?;
    conn.execute("DELETE FROM documents WHERE id = ?1", [id])?;
    Ok(())
}

/// All public documents plus the ones `actor` owns, most recently edited first.
pub fn list_documents(conn: &Connection, actor: &User) -> Result<Vec<DocumentView>, AppError> {
    let sql = format!(
        "{SELECT_JOINED} WHERE d.is_public = 1 OR d.created_by = ?1 ORDER BY d.last_edited_at DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([&actor.id], row_to_document)?
        .collect::<Result<Vec<_>, _>>()?;
    let mut images = images::list_for_visible_documents(conn, &actor.id)?;
    let views = rows
        .into_iter()
        .map(|row| {
            let attached = images.remove(&row.doc.id).unwrap_or_default();
            row.into_view(attached)
        })
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(views)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{images::NewImage, users};

    fn setup() -> (Connection, User, User) {
        let conn = db::init_db(":memory:").unwrap();
        let a = users::create_user(&conn, "a@example.com", Some("Alice"), "x").unwrap();
        let b = users::create_user(&conn, "b@example.com", None, "x").unwrap();
        (conn, a, b)
    }

    fn new_doc(title: &str, is_public: bool) -> NewDocument {
        NewDocument {
            title: Some(title.into()),
            content: None,
            is_public: Some(is_public),
        }
    }

    #[test]
    fn create_fills_defaults() {
        let (conn, a, _) = setup();
        let doc = create_document(&conn, &a, NewDocument::default()).unwrap();
        assert_eq!(doc.title, UNTITLED);
        assert_eq!(doc.content, "");
        assert!(!doc.is_public);
        assert_eq!(doc.created_by_id, a.id);
        assert_eq!(doc.last_edited_by_id.as_deref(), Some(a.id.as_str()));
        assert_eq!(doc.created_by.name.as_deref(), Some("Alice"));
        assert_eq!(doc.last_edited_by, Some(a.user_ref()));

        let doc = create_document(&conn, &a, new_doc("", true)).unwrap();
        assert_eq!(doc.title, UNTITLED);
        assert!(doc.is_public);
    }

    #[test]
    fn private_document_hidden_from_others() {
        let (conn, a, b) = setup();
        let doc = create_document(&conn, &a, new_doc("Notes", false)).unwrap();
        assert!(get_document(&conn, &doc.id, &a).is_ok());
        assert!(matches!(
            get_document(&conn, &doc.id, &b),
            Err(AppError::Forbidden)
        ));
        assert!(matches!(
            update_document(&conn, &doc.id, &b, DocumentPatch::default()),
            Err(AppError::Forbidden)
        ));
        assert!(matches!(
            delete_document(&conn, &doc.id, &b),
            Err(AppError::Forbidden)
        ));
        assert!(matches!(
            get_document(&conn, "missing", &a),
            Err(AppError::DocumentNotFound)
        ));
    }

    #[test]
    fn empty_patch_stamps_editor_and_time() {
        let (conn, a, b) = setup();
        let doc = create_document(&conn, &a, new_doc("Shared", true)).unwrap();
        let updated = update_document(&conn, &doc.id, &b, DocumentPatch::default()).unwrap();
        assert!(updated.last_edited_at > doc.last_edited_at);
        assert_eq!(updated.last_edited_by_id.as_deref(), Some(b.id.as_str()));
        assert_eq!(updated.last_edited_by, Some(b.user_ref()));
        assert_eq!(updated.title, "Shared");
        assert_eq!(updated.created_at, doc.created_at);
        assert_eq!(updated.created_by_id, a.id);
    }

    #[test]
    fn non_owner_cannot_flip_visibility() {
        let (conn, a, b) = setup();
        let doc = create_document(&conn, &a, new_doc("Shared", true)).unwrap();
        let patch = DocumentPatch {
            title: Some("Edited by B".into()),
            content: Some("body".into()),
            is_public: Some(false),
        };
        let updated = update_document(&conn, &doc.id, &b, patch).unwrap();
        assert!(updated.is_public);
        assert_eq!(updated.title, "Edited by B");
        assert_eq!(updated.content, "body");

        let patch = DocumentPatch {
            is_public: Some(false),
            ..Default::default()
        };
        let updated = update_document(&conn, &doc.id, &a, patch).unwrap();
        assert!(!updated.is_public);
        assert_eq!(updated.title, "Edited by B");
    }

    #[test]
    fn explicit_empty_title_is_kept() {
        let (conn, a, _) = setup();
        let doc = create_document(&conn, &a, new_doc("Notes", false)).unwrap();
        let patch = DocumentPatch {
            title: Some(String::new()),
            ..Default::default()
        };
        let updated = update_document(&conn, &doc.id, &a, patch).unwrap();
        assert_eq!(updated.title, "");
    }

    #[test]
    fn list_is_public_plus_owned_by_recency() {
        let (conn, a, b) = setup();
        let a_private = create_document(&conn, &a, new_doc("A private", false)).unwrap();
        let a_public = create_document(&conn, &a, new_doc("A public", true)).unwrap();
        let b_private = create_document(&conn, &b, new_doc("B private", false)).unwrap();

        let ids = |docs: Vec<DocumentView>| docs.into_iter().map(|d| d.id).collect::<Vec<_>>();
        let for_b = ids(list_documents(&conn, &b).unwrap());
        assert_eq!(for_b.len(), 2);
        assert!(for_b.contains(&a_public.id) && for_b.contains(&b_private.id));
        assert!(!for_b.contains(&a_private.id));

        // touching the oldest document moves it to the front
        update_document(&conn, &a_private.id, &a, DocumentPatch::default()).unwrap();
        let for_a = ids(list_documents(&conn, &a).unwrap());
        assert_eq!(for_a.first(), Some(&a_private.id));
        assert_eq!(for_a.len(), 2);
    }

    #[test]
    fn delete_cascades_image_rows() {
        let (conn, a, b) = setup();
        let doc = create_document(&conn, &a, new_doc("Pics", true)).unwrap();
        images::insert_image(
            &conn,
            &b,
            &NewImage {
                filename: "1-abc.png",
                original_name: "cat.png",
                mime_type: "image/png",
                size: 3,
                document_id: Some(&doc.id),
            },
        )
        .unwrap();
        let fetched = get_document(&conn, &doc.id, &b).unwrap();
        assert_eq!(fetched.images.len(), 1);
        let listed = list_documents(&conn, &a).unwrap();
        assert_eq!(listed[0].images.len(), 1);

        delete_document(&conn, &doc.id, &a).unwrap();
        assert!(matches!(
            get_document(&conn, &doc.id, &a),
            Err(AppError::DocumentNotFound)
        ));
        assert!(images::find_by_filename(&conn, "1-abc.png").unwrap().is_none());
        assert!(list_documents(&conn, &b).unwrap().is_empty());
    }
}

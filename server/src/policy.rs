//! Read/edit/delete/visibility decisions for documents.
//!
//! Every function takes the freshest document row and the acting user as
//! explicit arguments and touches nothing else.

use crate::{
    error::AppError,
    model::{Document, User},
};
use notelite_api::DocumentPatch;

pub fn is_owner(doc: &Document, actor: &User) -> bool {
    doc.created_by == actor.id
}

/// Public documents are readable by anyone signed in, private ones by their owner.
pub fn can_read(doc: &Document, actor: &User) -> bool {
    doc.is_public || is_owner(doc, actor)
}

/// Public documents are collaboratively editable, so editing follows the read rule.
pub fn can_edit(doc: &Document, actor: &User) -> bool {
    can_read(doc, actor)
}

pub fn can_change_visibility(doc: &Document, actor: &User) -> bool {
    is_owner(doc, actor)
}

pub fn can_delete(doc: &Document, actor: &User) -> bool {
    is_owner(doc, actor)
}

fn require(allowed: bool) -> Result<(), AppError> {
    if allowed {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

pub fn check_read(doc: &Document, actor: &User) -> Result<(), AppError> {
    require(can_read(doc, actor))
}

pub fn check_edit(doc: &Document, actor: &User) -> Result<(), AppError> {
    require(can_edit(doc, actor))
}

pub fn check_delete(doc: &Document, actor: &User) -> Result<(), AppError> {
    require(can_delete(doc, actor))
}

/// Reduce a patch to the fields `actor` may change.
///
/// A visibility change from a non-owner is dropped while the rest of the
/// patch still applies.
pub fn permitted_patch(doc: &Document, actor: &User, patch: DocumentPatch) -> DocumentPatch {
    let is_public = if can_change_visibility(doc, actor) {
        patch.is_public
    } else {
        None
    };
    DocumentPatch {
        title: patch.title,
        content: patch.content,
        is_public,
    }
}

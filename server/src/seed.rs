use crate::{documents, users};
use anyhow::{Context, Result};
use rusqlite::Connection;
use tracing::info;

struct SeedUser {
    email: &'static str,
    name: &'static str,
    password: &'static str,
}

const USERS: &[SeedUser] = &[
    SeedUser {
        email: "admin@demo.com",
        name: "Admin User",
        password: "admin123",
    },
    SeedUser {
        email: "alice@demo.com",
        name: "Alice Johnson",
        password: "password123",
    },
    SeedUser {
        email: "bob@demo.com",
        name: "Bob Smith",
        password: "password123",
    },
    SeedUser {
        email: "john@doe.com",
        name: "John Doe",
        password: "johndoe123",
    },
];

struct SeedDocument {
    id: &'static str,
    owner: &'static str,
    title: &'static str,
    content: &'static str,
    is_public: bool,
}

const DOCUMENTS: &[SeedDocument] = &[
    SeedDocument {
        id: "sample-public-1",
        owner: "admin@demo.com",
        title: "Welcome to NotionLite",
        content: "# Welcome to NotionLite!\n\n\
This is a **public document** that everyone can view and edit.\n\n\
## Key Features\n\n\
- **Public & Private Documents**: control who can access your content\n\
- **Image Upload**: add images to your documents\n\
- **Collaborative Editing**: public documents can be edited by anyone\n\n\
## Markdown Support\n\n\
- **Bold text** with **asterisks**\n\
- *Italic text* with *single asterisks*\n\
- # Headers with hash symbols\n\n\
*Happy documenting!*",
        is_public: true,
    },
    SeedDocument {
        id: "sample-public-2",
        owner: "alice@demo.com",
        title: "Project Planning Template",
        content: "# Project Planning Template\n\n\
This is a **collaborative template** for project planning. Feel free to edit it!\n\n\
## Project Overview\n\n\
**Project Name:** [Enter project name]\n\
**Start Date:** [Enter start date]\n\n\
## Timeline\n\n\
### Phase 1: Planning\n\
### Phase 2: Development\n\
### Phase 3: Launch\n",
        is_public: true,
    },
    SeedDocument {
        id: "sample-private-1",
        owner: "bob@demo.com",
        title: "My Personal Notes",
        content: "# My Personal Notes\n\n\
This is a **private document** - only I can see and edit this content.\n\n\
## Ideas\n\n\
- App feature: dark mode toggle\n\
- Book to read: *Clean Code*\n",
        is_public: false,
    },
];

/// Insert the demo users and documents. Existing rows are left untouched.
pub fn seed(conn: &Connection) -> Result<()> {
    for u in USERS {
        users::ensure_user(conn, u.email, Some(u.name), u.password)
            .with_context(|| format!("seeding user {}", u.email))?;
    }
    info!(count = USERS.len(), "seeded users");

    for d in DOCUMENTS {
        if documents::find_document(conn, d.id)?.is_some() {
            continue;
        }
        let owner = users::find_by_email(conn, d.owner)?
            .with_context(|| format!("seed owner {} missing", d.owner))?;
        documents::insert_document(conn, d.id, &owner, d.title, d.content, d.is_public)?;
    }
    info!(count = DOCUMENTS.len(), "seeded documents");
    Ok(())
}

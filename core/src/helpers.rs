//! Naming conventions shared by key inference and default struct types.

use heck::ToUpperCamelCase;
use trellis_types::Name;

/// Naive English singular of a relation name (`users` -> `user`, `categories` -> `category`).
pub fn singularize(word: &str) -> String {
    if let Some(stem) = word.strip_suffix("ies") {
        format!("{stem}y")
    } else if word.ends_with("sses")
        || word.ends_with("xes")
        || word.ends_with("ches")
        || word.ends_with("shes")
    {
        word[..word.len() - 2].to_owned()
    } else if word.ends_with('s') && !word.ends_with("ss") {
        word[..word.len() - 1].to_owned()
    } else {
        word.to_owned()
    }
}

/// Conventional foreign key pointing at `relation` (`users` -> `user_id`).
pub fn foreign_key_for(relation: &str) -> Name {
    Name::from(format!("{}_id", singularize(relation)))
}

/// Default struct type name for a relation (`posts_labels` -> `PostsLabel`).
pub fn struct_name_for(relation: &str) -> Name {
    Name::from(singularize(relation).to_upper_camel_case())
}

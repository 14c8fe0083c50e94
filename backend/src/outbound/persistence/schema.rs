//! Diesel table definitions for the PostgreSQL schema.
//!
//! These definitions must match `backend/migrations` exactly. They are used
//! by Diesel for compile-time query validation and type-safe SQL generation.
//!
//! # Maintenance
//!
//! When migrations change the schema, this file should be regenerated or
//! manually updated to reflect those changes. The `diesel print-schema`
//! command can generate these definitions from a live database.

diesel::table! {
    /// Registered accounts with their cached follow counters.
    users (id) {
        id -> Int8,
        username -> Varchar,
        email -> Varchar,
        password_hash -> Varchar,
        profile_pic -> Nullable<Varchar>,
        /// Projection of `follows` rows targeting this user.
        followers_count -> Int4,
        /// Projection of `follows` rows originating from this user.
        following_count -> Int4,
        is_admin -> Bool,
    }
}

diesel::table! {
    /// Optional 1:1 profile of a user.
    user_profiles (user_id) {
        user_id -> Int8,
        bio -> Nullable<Text>,
        social_links -> Nullable<Text>,
        profile_pic -> Nullable<Varchar>,
    }
}

diesel::table! {
    /// Validated per-user settings map.
    user_settings (user_id) {
        user_id -> Int8,
        settings -> Jsonb,
    }
}

diesel::table! {
    /// Directed follow edges. The composite key forbids duplicates; a check
    /// constraint forbids self edges.
    follows (follower_id, followed_id) {
        follower_id -> Int8,
        followed_id -> Int8,
    }
}

diesel::table! {
    categories (id) {
        id -> Int8,
        name -> Varchar,
    }
}

diesel::table! {
    /// Posts with the engagement counters maintained alongside ratings and
    /// comments.
    posts (id) {
        id -> Int8,
        author_id -> Int8,
        category_id -> Int8,
        title -> Varchar,
        content -> Text,
        likes_count -> Int4,
        dislikes_count -> Int4,
        comments_count -> Int4,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    tags (id) {
        id -> Int8,
        name -> Varchar,
    }
}

diesel::table! {
    post_tags (post_id, tag_id) {
        post_id -> Int8,
        tag_id -> Int8,
    }
}

diesel::table! {
    comments (id) {
        id -> Int8,
        post_id -> Int8,
        author_id -> Int8,
        content -> Text,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// At most one rating per `(post_id, user_id)`.
    ratings (id) {
        id -> Int8,
        post_id -> Int8,
        user_id -> Int8,
        /// Either `like` or `dislike`.
        status -> Varchar,
    }
}

diesel::table! {
    user_favourites (user_id, post_id) {
        user_id -> Int8,
        post_id -> Int8,
    }
}

diesel::table! {
    notifications (id) {
        id -> Int8,
        receiver_id -> Int8,
        content -> Text,
        is_read -> Bool,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Private messages. Only ciphertext is stored.
    messages (id) {
        id -> Int8,
        sender_id -> Int8,
        recipient_id -> Int8,
        ciphertext -> Bytea,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Attachment metadata. The bytes live in the blob store under
    /// `blob_ref`.
    attachments (id) {
        id -> Int8,
        user_id -> Int8,
        post_id -> Nullable<Int8>,
        comment_id -> Nullable<Int8>,
        file_name -> Varchar,
        content_type -> Varchar,
        size_bytes -> Int8,
        blob_ref -> Varchar,
        created_at -> Timestamptz,
    }
}

diesel::joinable!(user_profiles -> users (user_id));
diesel::joinable!(user_settings -> users (user_id));
diesel::joinable!(posts -> users (author_id));
diesel::joinable!(posts -> categories (category_id));
diesel::joinable!(post_tags -> posts (post_id));
diesel::joinable!(post_tags -> tags (tag_id));
diesel::joinable!(comments -> posts (post_id));
diesel::joinable!(ratings -> posts (post_id));
diesel::joinable!(user_favourites -> posts (post_id));
diesel::joinable!(notifications -> users (receiver_id));
diesel::joinable!(attachments -> users (user_id));

diesel::allow_tables_to_appear_in_same_query!(
    users,
    user_profiles,
    user_settings,
    follows,
    categories,
    posts,
    tags,
    post_tags,
    comments,
    ratings,
    user_favourites,
    notifications,
    messages,
    attachments,
);

//! Diesel schema for task queue persistence.

diesel::table! {
    /// Queued, running and finished generation tasks.
    generation_tasks (id) {
        /// Internal task identifier.
        id -> Uuid,
        /// Insertion sequence used to break creation-time ties.
        queue_position -> Int8,
        /// Business date grouping sibling tasks.
        task_date -> Date,
        /// Task kind.
        #[max_length = 50]
        task_type -> Varchar,
        /// Origin of the enqueue call.
        #[max_length = 16]
        trigger_source -> Varchar,
        /// Owning generation profile.
        profile_id -> Uuid,
        /// Lifecycle status.
        #[max_length = 16]
        status -> Varchar,
        /// Optimistic-concurrency token.
        version -> Int8,
        /// Checkpoint while running, result summary once succeeded.
        result_json -> Nullable<Jsonb>,
        /// Failure message.
        error_message -> Nullable<Text>,
        /// Structured failure context.
        error_context_json -> Nullable<Jsonb>,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Claim timestamp.
        started_at -> Nullable<Timestamptz>,
        /// Completion timestamp.
        finished_at -> Nullable<Timestamptz>,
        /// Publication timestamp.
        published_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    /// Named generation configurations.
    generation_profiles (id) {
        /// Profile identifier.
        id -> Uuid,
        /// Unique profile name.
        #[max_length = 255]
        name -> Varchar,
        /// Topic preference handed to the generation client.
        topic_preference -> Text,
        /// Configured concurrency.
        concurrency -> Int4,
        /// Creation timestamp.
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Vocabulary to teach per business date.
    daily_word_supplies (task_date) {
        /// Business date.
        task_date -> Date,
        /// Words introduced on the date.
        new_words -> Array<Text>,
        /// Words scheduled for review on the date.
        review_words -> Array<Text>,
        /// Fetch timestamp.
        fetched_at -> Timestamptz,
    }
}

diesel::table! {
    /// Articles published by succeeded tasks.
    articles (id) {
        /// Article identifier.
        id -> Uuid,
        /// Generating task.
        task_id -> Uuid,
        /// Profile the article was generated for.
        profile_id -> Uuid,
        /// Business date of the generating task.
        task_date -> Date,
        /// Headline.
        title -> Text,
        /// Markdown body.
        content -> Text,
        /// Taught words.
        selected_words -> Array<Text>,
        /// Hex SHA-256 digest of the body.
        #[max_length = 64]
        content_sha256 -> Varchar,
        /// Publication status.
        #[max_length = 16]
        status -> Varchar,
        /// Publication timestamp.
        published_at -> Timestamptz,
        /// Creation timestamp.
        created_at -> Timestamptz,
    }
}

diesel::joinable!(articles -> generation_tasks (task_id));
diesel::joinable!(generation_tasks -> generation_profiles (profile_id));

diesel::allow_tables_to_appear_in_same_query!(
    articles,
    daily_word_supplies,
    generation_profiles,
    generation_tasks,
);

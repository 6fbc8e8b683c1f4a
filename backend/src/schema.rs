diesel::table! {
    api_keys (api_key) {
        api_key -> Text,
        community_name -> Text,
        master -> Bool,
        timestamp -> Timestamp,
    }
}

diesel::table! {
    communities (community_name) {
        community_name -> Text,
        owner_steam_id -> Text,
        disabled -> Bool,
        timestamp -> Timestamp,
    }
}

diesel::table! {
    matches (match_id) {
        match_id -> Text,
        community_name -> Text,
        team_1_name -> Text,
        team_2_name -> Text,
        team_1_side -> Int2,
        team_2_side -> Int2,
        team_1_score -> Int4,
        team_2_score -> Int4,
        map -> Text,
        status -> Int2,
        demo_status -> Int2,
        timestamp -> Timestamp,
    }
}

diesel::table! {
    scoreboard (match_id, steam_id) {
        match_id -> Text,
        steam_id -> Text,
        name -> Text,
        team -> Int2,
        alive -> Bool,
        ping -> Int4,
        kills -> Int4,
        headshots -> Int4,
        assists -> Int4,
        deaths -> Int4,
        shots_fired -> Int4,
        shots_hit -> Int4,
        mvps -> Int4,
        score -> Int4,
        disconnected -> Bool,
    }
}

diesel::table! {
    sessions (id) {
        id -> Text,
        steam_id -> Nullable<Text>,
        expiry_date -> Text,
    }
}

diesel::table! {
    statistics (community_name, steam_id) {
        community_name -> Text,
        steam_id -> Text,
        kills -> Int8,
        headshots -> Int8,
        assists -> Int8,
        deaths -> Int8,
        shots_fired -> Int8,
        shots_hit -> Int8,
        mvps -> Int8,
    }
}

diesel::table! {
    users (steam_id) {
        steam_id -> Text,
        name -> Text,
        timestamp -> Timestamp,
    }
}

diesel::joinable!(api_keys -> communities (community_name));
diesel::joinable!(matches -> communities (community_name));
diesel::joinable!(scoreboard -> matches (match_id));
diesel::joinable!(scoreboard -> users (steam_id));
diesel::joinable!(statistics -> communities (community_name));
diesel::joinable!(statistics -> users (steam_id));

diesel::allow_tables_to_appear_in_same_query!(
    api_keys,
    communities,
    matches,
    scoreboard,
    sessions,
    statistics,
    users,
);

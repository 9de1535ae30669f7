/*
 *  Copyright 2025-2026 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

// Shared by both backends; types are limited to what AnyConnection supports.

diesel::table! {
    users (name) {
        name -> Text,
        realname -> Text,
        state -> Integer,
        expiration -> BigInt,
        ssh_key_hash -> Nullable<Text>,
        ssh_key -> Nullable<Text>,
        expiry -> Nullable<Text>,
        principals -> Nullable<Text>,
    }
}

diesel::table! {
    revocation (ssh_key) {
        ssh_key -> Text,
        revocation_date -> BigInt,
        username -> Text,
    }
}

diesel::allow_tables_to_appear_in_same_query!(users, revocation);

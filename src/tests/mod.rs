mod api_keys;
mod change_password;
mod helper;
mod invalid_json;
mod jobs;
mod login;
mod management;

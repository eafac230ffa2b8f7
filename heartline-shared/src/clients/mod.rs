pub mod db;
pub mod minio;
pub mod redis;

pub use db::{create_pool, DbPool};
pub use minio::MinioClient;
pub use self::redis::RedisClient;

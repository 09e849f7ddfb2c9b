use std::path::PathBuf;

use thiserror::Error;

use crate::entry::IdentityKey;

/// ttrackのコア処理で発生するエラー。
///
/// CLIの外側の層では`anyhow::Error`に包まれて伝播し、`main`で終了コードが決まる。
#[derive(Debug, Error)]
pub enum TrackError {
    /// 時刻・期間のパース失敗や排他的なオプションの同時指定など、入力値の誤り。
    #[error("{0}")]
    Validation(String),

    /// 進行中エントリーの二重開始や完了済みエントリーの上書きなど、状態の衝突。
    #[error("{0}")]
    Conflict(String),

    /// マージ元のエントリーに同じキーが重複している。
    #[error("Entries have duplicate {key}: {value}")]
    DuplicateKey { key: IdentityKey, value: u64 },

    /// FreshBooks APIが想定外のレスポンスを返した。
    #[error("{0}")]
    Remote(String),

    /// ファイルが存在しない。初回起動や未認証の判定に利用する。
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to access {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("Failed to parse {}", .path.display())]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl TrackError {
    /// ファイル操作のエラーを変換する。存在しない場合は`NotFound`とする。
    pub fn from_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            TrackError::NotFound(path)
        } else {
            TrackError::Io { path, source }
        }
    }
}

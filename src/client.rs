use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TrackError;

/// 請求先の情報。新しいエントリーのclient id, project idに利用する。
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    pub nickname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<u64>,
}

impl fmt::Display for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Nickname: {}", self.nickname)?;
        writeln!(f, "Client ID: {}", self.client_id.unwrap_or_default())?;
        write!(f, "Project ID: {}", self.project_id.unwrap_or_default())
    }
}

/// `filter_clients`の検索条件。いずれかの条件に一致したものを返す。
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClientFilter {
    /// 大文字小文字を区別しないnickname。
    pub nickname: Option<String>,
    pub client_id: Option<u64>,
    pub project_id: Option<u64>,
}

impl ClientFilter {
    fn is_empty(&self) -> bool {
        self == &ClientFilter::default()
    }

    fn matches(&self, client: &Client) -> bool {
        let nickname = self
            .nickname
            .as_ref()
            .is_some_and(|nickname| nickname.to_lowercase() == client.nickname.to_lowercase());
        let client_id = self.client_id.is_some() && self.client_id == client.client_id;
        let project_id = self.project_id.is_some() && self.project_id == client.project_id;

        nickname || client_id || project_id
    }
}

/// nicknameが重複していなければ`client`を追加する。大文字小文字は区別しない。
pub fn add_client(clients: &mut Vec<Client>, client: Client) -> Result<(), TrackError> {
    let nickname = client.nickname.to_lowercase();
    if clients.iter().any(|c| c.nickname.to_lowercase() == nickname) {
        return Err(TrackError::Conflict(format!(
            "client with nickname {} already exists",
            client.nickname
        )));
    }
    clients.push(client);
    Ok(())
}

/// 条件に一致するclientを返す。条件が空の場合は全て返す。
pub fn filter_clients<'a>(clients: &'a [Client], filter: &ClientFilter) -> Vec<&'a Client> {
    clients
        .iter()
        .filter(|client| filter.is_empty() || filter.matches(client))
        .collect()
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{add_client, filter_clients, Client, ClientFilter};
    use crate::error::TrackError;

    fn clients() -> Vec<Client> {
        vec![
            Client {
                nickname: "default".to_string(),
                client_id: None,
                project_id: None,
            },
            Client {
                nickname: "Acme".to_string(),
                client_id: Some(67837),
                project_id: Some(5476277),
            },
            Client {
                nickname: "initech".to_string(),
                client_id: Some(11),
                project_id: Some(22),
            },
        ]
    }

    #[test]
    fn test_add_client() {
        let mut clients = clients();
        let client = Client {
            nickname: "globex".to_string(),
            client_id: Some(1),
            project_id: None,
        };

        add_client(&mut clients, client.clone()).unwrap();

        assert_eq!(clients.len(), 4);
        assert_eq!(clients[3], client);
    }

    #[rstest]
    #[case::same_case("Acme")]
    #[case::different_case("acme")]
    fn test_add_client_duplicate_nickname(#[case] nickname: &str) {
        let mut clients = clients();
        let client = Client {
            nickname: nickname.to_string(),
            ..Default::default()
        };

        let result = add_client(&mut clients, client);

        assert!(matches!(result, Err(TrackError::Conflict(_))));
        assert_eq!(clients.len(), 3);
    }

    #[rstest]
    #[case::empty(ClientFilter::default(), vec!["default", "Acme", "initech"])]
    #[case::nickname_ignores_case(
        ClientFilter { nickname: Some("acme".to_string()), ..Default::default() },
        vec!["Acme"],
    )]
    #[case::client_id(ClientFilter { client_id: Some(11), ..Default::default() }, vec!["initech"])]
    #[case::any_match(
        ClientFilter { nickname: Some("default".to_string()), project_id: Some(5476277), ..Default::default() },
        vec!["default", "Acme"],
    )]
    #[case::no_match(ClientFilter { client_id: Some(404), ..Default::default() }, vec![])]
    fn test_filter_clients(#[case] filter: ClientFilter, #[case] expected: Vec<&str>) {
        let clients = clients();

        let result = filter_clients(&clients, &filter);

        let nicknames: Vec<_> = result.iter().map(|c| c.nickname.as_str()).collect();
        assert_eq!(nicknames, expected);
    }

    #[test]
    fn test_display() {
        let text = clients()[1].to_string();

        assert_eq!(text, "Nickname: Acme\nClient ID: 67837\nProject ID: 5476277");
    }
}

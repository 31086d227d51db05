//! Shared harness for service-level integration tests: drives the server
//! through its dispatch surface with in-memory sockets.
#![allow(dead_code)]

use chrono::{Duration as ChronoDuration, Utc};
use quiz_rush_server::config::Config;
use quiz_rush_server::protocol::{ClientMessage, Pin, ServerMessage, SocketId};
use quiz_rush_server::quiz::{InMemoryQuizRepository, Question, Quiz};
use quiz_rush_server::security::HmacTokenVerifier;
use quiz_rush_server::server::QuizServer;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

pub struct Harness {
    pub server: Arc<QuizServer>,
    pub quiz_id: Uuid,
    secret: String,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config_and_quiz(Config::default(), quiz_with(2, 1000, 10))
    }

    pub fn with_config(config: Config) -> Self {
        Self::with_config_and_quiz(config, quiz_with(2, 1000, 10))
    }

    pub fn with_config_and_quiz(config: Config, quiz: Quiz) -> Self {
        let repo = Arc::new(InMemoryQuizRepository::new());
        let quiz_id = repo.insert(quiz).expect("valid test quiz");
        let secret = config.security.host_token_secret.clone();
        let server = QuizServer::new(&config, repo, Arc::new(HmacTokenVerifier::new(&secret)));
        Self {
            server,
            quiz_id,
            secret,
        }
    }

    /// Register an in-memory socket.
    pub fn connect(&self) -> TestClient {
        let socket_id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(256);
        self.server.register_socket(socket_id, tx);
        TestClient {
            socket_id,
            rx,
            inbox: Vec::new(),
        }
    }

    /// Register a socket and authenticate it as a fresh host user.
    pub async fn connect_host(&self) -> TestClient {
        self.connect_host_as(Uuid::new_v4()).await
    }

    /// Register a socket and authenticate it as a specific host user.
    pub async fn connect_host_as(&self, user_id: Uuid) -> TestClient {
        let mut client = self.connect();
        let verifier = HmacTokenVerifier::new(&self.secret);
        let token = verifier.issue(user_id, Utc::now() + ChronoDuration::hours(1));
        self.send(&client, ClientMessage::Authenticate {
            access_token: token,
        })
        .await;
        assert!(
            client.has(|m| matches!(m, ServerMessage::Authenticated { .. })),
            "host authentication failed"
        );
        client.clear();
        client
    }

    pub async fn send(&self, client: &TestClient, message: ClientMessage) {
        self.server
            .handle_client_message(client.socket_id, message)
            .await;
    }

    /// Create a room and return (host, pin, host_token).
    pub async fn create_room(&self) -> (TestClient, Pin, String) {
        self.create_room_as(Uuid::new_v4()).await
    }

    /// Create a room for a specific host user.
    pub async fn create_room_as(&self, user_id: Uuid) -> (TestClient, Pin, String) {
        let mut host = self.connect_host_as(user_id).await;
        self.send(&host, ClientMessage::CreateRoom {
            quiz_id: self.quiz_id,
        })
        .await;
        let created = host
            .get(|m| matches!(m, ServerMessage::RoomCreated(_)))
            .expect("room_created reply");
        let (pin, host_token) = match created.as_ref() {
            ServerMessage::RoomCreated(payload) => {
                (payload.pin.clone(), payload.host_token.clone())
            }
            _ => unreachable!(),
        };
        host.clear();
        (host, pin, host_token)
    }

    /// Join a player, asserting success; returns (client, player token).
    pub async fn join_player(&self, pin: &Pin, nickname: &str) -> (TestClient, String) {
        let mut client = self.connect();
        self.send(&client, ClientMessage::JoinRoom {
            pin: pin.as_str().to_string(),
            nickname: nickname.to_string(),
        })
        .await;
        let joined = client
            .get(|m| matches!(m, ServerMessage::RoomJoined(_)))
            .expect("room_joined reply");
        let token = match joined.as_ref() {
            ServerMessage::RoomJoined(payload) => payload.player_token.clone(),
            _ => unreachable!(),
        };
        client.clear();
        (client, token)
    }
}

pub struct TestClient {
    pub socket_id: SocketId,
    rx: mpsc::Receiver<Arc<ServerMessage>>,
    inbox: Vec<Arc<ServerMessage>>,
}

impl TestClient {
    /// Move everything queued on the socket into the inbox.
    pub fn pump(&mut self) -> &[Arc<ServerMessage>] {
        while let Ok(message) = self.rx.try_recv() {
            self.inbox.push(message);
        }
        &self.inbox
    }

    pub fn has<F>(&mut self, pred: F) -> bool
    where
        F: Fn(&ServerMessage) -> bool,
    {
        self.pump();
        self.inbox.iter().any(|m| pred(m.as_ref()))
    }

    pub fn get<F>(&mut self, pred: F) -> Option<Arc<ServerMessage>>
    where
        F: Fn(&ServerMessage) -> bool,
    {
        self.pump();
        self.inbox.iter().find(|m| pred(m.as_ref())).cloned()
    }

    pub fn clear(&mut self) {
        self.pump();
        self.inbox.clear();
    }

    /// Poll until a matching message arrives or the timeout lapses.
    pub async fn wait_for<F>(&mut self, pred: F, timeout: Duration) -> Arc<ServerMessage>
    where
        F: Fn(&ServerMessage) -> bool,
    {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(found) = self.get(&pred) {
                return found;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "timed out waiting for message"
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

/// A quiz of `count` questions, four options each, first option correct.
pub fn quiz_with(count: usize, points: u32, time_limit_seconds: u32) -> Quiz {
    let questions = (0..count)
        .map(|index| Question {
            text: format!("Question {index}"),
            options: vec![
                "Option A".to_string(),
                "Option B".to_string(),
                "Option C".to_string(),
                "Option D".to_string(),
            ],
            correct_answer_index: 0,
            time_limit_seconds,
            points,
            image_url: None,
        })
        .collect();
    Quiz {
        id: Uuid::new_v4(),
        title: "Integration Quiz".to_string(),
        questions,
    }
}

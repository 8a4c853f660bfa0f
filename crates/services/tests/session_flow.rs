use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use assess_core::model::{
    AnswerInput, AttemptId, OptionId, Question, QuestionId, QuestionOption, QuestionType, TestId,
};
use assess_core::time::fixed_now;
use assess_core::{FinalPayload, FlatAnswer, ProgressPayload};
use services::{
    AdvanceOutcome, AssessmentLoopService, AssessmentSession, Clock, ExitChoice, ExitOutcome,
    LoadError, Notice, NotificationSink, SessionConfig, SessionError, SessionStatus,
};
use storage::repository::{
    InMemoryRepository, ProgressStore, ResumeTokenRepository, StorageError, SubmissionSink,
};

const TEST: TestId = TestId::new(1);

#[derive(Default)]
struct RecordingSink {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingSink {
    fn take(&self) -> Vec<Notice> {
        std::mem::take(&mut *self.notices.lock().unwrap())
    }
}

impl NotificationSink for RecordingSink {
    fn notify(&self, notice: Notice) {
        self.notices.lock().unwrap().push(notice);
    }
}

/// Delegates to the repository but fails the first `failures` writes.
struct FlakyWrites {
    inner: InMemoryRepository,
    failures: AtomicUsize,
}

impl FlakyWrites {
    fn new(inner: InMemoryRepository, failures: usize) -> Self {
        Self {
            inner,
            failures: AtomicUsize::new(failures),
        }
    }

    fn should_fail(&self) -> bool {
        self.failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait::async_trait]
impl ProgressStore for FlakyWrites {
    async fn start_attempt(&self, test_id: TestId) -> Result<AttemptId, StorageError> {
        self.inner.start_attempt(test_id).await
    }

    async fn fetch_prior_submission(
        &self,
        attempt_id: AttemptId,
    ) -> Result<Option<Vec<FlatAnswer>>, StorageError> {
        self.inner.fetch_prior_submission(attempt_id).await
    }

    async fn save_progress(&self, payload: &ProgressPayload) -> Result<(), StorageError> {
        if self.should_fail() {
            return Err(StorageError::Connection("offline".into()));
        }
        self.inner.save_progress(payload).await
    }
}

#[async_trait::async_trait]
impl SubmissionSink for FlakyWrites {
    async fn submit(&self, payload: &FinalPayload) -> Result<(), StorageError> {
        if self.should_fail() {
            return Err(StorageError::Rejected("server busy".into()));
        }
        self.inner.submit(payload).await
    }
}

/// Token store whose `clear_token` always fails.
struct StickyTokens {
    inner: InMemoryRepository,
}

#[async_trait::async_trait]
impl ResumeTokenRepository for StickyTokens {
    async fn get_token(&self, test_id: TestId) -> Result<Option<AttemptId>, StorageError> {
        self.inner.get_token(test_id).await
    }

    async fn put_token(&self, test_id: TestId, attempt_id: AttemptId) -> Result<(), StorageError> {
        self.inner.put_token(test_id, attempt_id).await
    }

    async fn clear_token(&self, _test_id: TestId) -> Result<(), StorageError> {
        Err(StorageError::Connection("disk full".into()))
    }
}

/// Progress store that cannot read saved answers.
struct UnreadableProgress {
    inner: InMemoryRepository,
}

#[async_trait::async_trait]
impl ProgressStore for UnreadableProgress {
    async fn start_attempt(&self, test_id: TestId) -> Result<AttemptId, StorageError> {
        self.inner.start_attempt(test_id).await
    }

    async fn fetch_prior_submission(
        &self,
        _attempt_id: AttemptId,
    ) -> Result<Option<Vec<FlatAnswer>>, StorageError> {
        Err(StorageError::Connection("offline".into()))
    }

    async fn save_progress(&self, payload: &ProgressPayload) -> Result<(), StorageError> {
        self.inner.save_progress(payload).await
    }
}

fn options(ids: &[u64]) -> Vec<QuestionOption> {
    ids.iter()
        .map(|id| QuestionOption::new(OptionId::new(*id), format!("O{id}")))
        .collect()
}

fn build_questions() -> Vec<Question> {
    vec![
        Question::new(QuestionId::new(10), QuestionType::SingleChoice, "Q1", options(&[1, 2]))
            .unwrap(),
        Question::new(QuestionId::new(20), QuestionType::MultiChoice, "Q2", options(&[3, 4, 5]))
            .unwrap()
            .with_max_select(2),
        Question::new(QuestionId::new(30), QuestionType::Slider, "Q3", options(&[6])).unwrap(),
        Question::new(QuestionId::new(40), QuestionType::Percentage, "Q4", options(&[7, 8]))
            .unwrap(),
    ]
}

fn seeded_repo() -> InMemoryRepository {
    let repo = InMemoryRepository::new();
    repo.put_questions(TEST, build_questions()).unwrap();
    repo
}

fn loop_service(repo: &InMemoryRepository) -> AssessmentLoopService {
    AssessmentLoopService::new(
        Clock::fixed(fixed_now()),
        Arc::new(repo.clone()),
        Arc::new(repo.clone()),
        Arc::new(repo.clone()),
        Arc::new(repo.clone()),
    )
}

fn flaky_service(
    repo: &InMemoryRepository,
    failures: usize,
    sink: Arc<RecordingSink>,
) -> AssessmentLoopService {
    let flaky = Arc::new(FlakyWrites::new(repo.clone(), failures));
    AssessmentLoopService::new(
        Clock::fixed(fixed_now()),
        Arc::new(repo.clone()),
        flaky.clone(),
        flaky,
        Arc::new(repo.clone()),
    )
    .with_config(SessionConfig::default())
    .with_notifier(sink)
}

#[tokio::test]
async fn fresh_session_runs_to_submission() {
    let repo = seeded_repo();
    let svc = loop_service(&repo);

    let mut session = svc.start_session(TEST).await.unwrap();
    assert!(!session.is_resumed());
    assert_eq!(session.position(), 0);
    assert_eq!(
        repo.get_token(TEST).await.unwrap(),
        Some(session.attempt_id())
    );

    assert_eq!(svc.advance(&mut session).await.unwrap(), AdvanceOutcome::Blocked);

    session.answer(AnswerInput::Select(OptionId::new(2))).unwrap();
    assert_eq!(svc.advance(&mut session).await.unwrap(), AdvanceOutcome::Moved(1));

    session.answer(AnswerInput::Toggle(OptionId::new(5))).unwrap();
    session.answer(AnswerInput::Toggle(OptionId::new(3))).unwrap();
    assert_eq!(svc.advance(&mut session).await.unwrap(), AdvanceOutcome::Moved(2));

    session.answer(AnswerInput::Slider(75)).unwrap();
    assert_eq!(svc.advance(&mut session).await.unwrap(), AdvanceOutcome::Moved(3));

    session.answer(AnswerInput::Allocate(vec![60, 30])).unwrap();
    assert_eq!(svc.advance(&mut session).await.unwrap(), AdvanceOutcome::Blocked);
    session.answer(AnswerInput::Allocate(vec![60, 40])).unwrap();
    assert_eq!(svc.advance(&mut session).await.unwrap(), AdvanceOutcome::Submitted);

    assert_eq!(session.status(), SessionStatus::Submitted);
    assert_eq!(repo.get_token(TEST).await.unwrap(), None);

    let submissions = repo.submissions().unwrap();
    assert_eq!(submissions.len(), 1);
    let answers = &submissions[0].answers;
    assert_eq!(answers[0].option_ids, vec![2]);
    assert_eq!(answers[1].option_ids, vec![5, 3]);
    assert_eq!(answers[2].option_ids, vec![6]);
    assert_eq!(answers[2].score, Some(vec![75]));
    assert_eq!(answers[3].option_ids, vec![7, 8]);
    assert_eq!(answers[3].score, Some(vec![60, 40]));

    assert!(matches!(
        session.answer(AnswerInput::Select(OptionId::new(1))),
        Err(SessionError::Closed)
    ));
}

#[tokio::test]
async fn saved_progress_is_resumed_on_next_start() {
    let repo = seeded_repo();
    let svc = loop_service(&repo);

    let mut session = svc.start_session(TEST).await.unwrap();
    let attempt_id = session.attempt_id();
    session.answer(AnswerInput::Select(OptionId::new(1))).unwrap();
    svc.advance(&mut session).await.unwrap();
    session.answer(AnswerInput::Toggle(OptionId::new(4))).unwrap();
    svc.advance(&mut session).await.unwrap();

    let outcome = svc
        .exit(&mut session, ExitChoice::SaveThenExit)
        .await
        .unwrap();
    assert_eq!(outcome, ExitOutcome::Saved);
    assert_eq!(session.status(), SessionStatus::Saved);
    assert_eq!(session.last_saved_at(), Some(fixed_now()));
    assert_eq!(repo.saved_progress(attempt_id).unwrap(), 3);

    let resumed = svc.start_session(TEST).await.unwrap();
    assert!(resumed.is_resumed());
    assert_eq!(resumed.attempt_id(), attempt_id);
    // furthest answered position, not the saved cursor
    assert_eq!(resumed.position(), 1);
    assert_eq!(resumed.answers(), session.answers());
}

#[tokio::test]
async fn failed_save_keeps_session_open_and_reports_error_notice() {
    let repo = seeded_repo();
    let sink = Arc::new(RecordingSink::default());
    let svc = flaky_service(&repo, 1, sink.clone());

    let mut session = svc.start_session(TEST).await.unwrap();
    session.answer(AnswerInput::Select(OptionId::new(1))).unwrap();

    let err = svc
        .exit(&mut session, ExitChoice::SaveThenExit)
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::Save(StorageError::Connection(_))));
    assert!(err.is_recoverable());
    assert_eq!(session.status(), SessionStatus::Active);
    assert_eq!(session.last_saved_at(), None);
    assert_eq!(
        sink.take(),
        vec![
            Notice::Loading {
                message: "Saving progress".into()
            },
            Notice::Error {
                message: "Could not save progress".into(),
                dismiss_after: Duration::from_millis(3_000),
            },
        ]
    );

    svc.save_progress(&mut session).await.unwrap();
    assert!(matches!(sink.take().last(), Some(Notice::Success { .. })));
    assert!(session.is_active());
}

#[tokio::test]
async fn failed_submit_leaves_session_intact_for_retry() {
    let repo = seeded_repo();
    let sink = Arc::new(RecordingSink::default());
    let svc = flaky_service(&repo, 1, sink.clone());

    let repo_questions = build_questions();
    let mut session = svc.start_session(TEST).await.unwrap();
    session.answer(AnswerInput::Select(OptionId::new(1))).unwrap();
    session.jump_to(1).unwrap();
    session.answer(AnswerInput::Toggle(OptionId::new(3))).unwrap();
    session.jump_to(2).unwrap();
    session.answer(AnswerInput::Slider(10)).unwrap();
    session.jump_to(3).unwrap();
    session.answer(AnswerInput::Allocate(vec![100, 0])).unwrap();
    assert_eq!(session.position(), repo_questions.len() - 1);

    let err = svc.advance(&mut session).await.unwrap_err();
    assert!(matches!(err, SessionError::Submit(StorageError::Rejected(_))));
    assert!(session.is_active());
    assert_eq!(repo.get_token(TEST).await.unwrap(), Some(session.attempt_id()));
    assert!(repo.submissions().unwrap().is_empty());

    assert_eq!(svc.advance(&mut session).await.unwrap(), AdvanceOutcome::Submitted);
    assert_eq!(repo.submissions().unwrap().len(), 1);
    assert_eq!(repo.get_token(TEST).await.unwrap(), None);
}

#[tokio::test]
async fn submit_refuses_incomplete_answers() {
    let repo = seeded_repo();
    let svc = loop_service(&repo);
    let mut session = svc.start_session(TEST).await.unwrap();
    session.answer(AnswerInput::Select(OptionId::new(1))).unwrap();

    let err = svc.submit(&mut session).await.unwrap_err();
    assert!(matches!(err, SessionError::Submission(_)));
    assert!(session.is_active());
    assert!(repo.submissions().unwrap().is_empty());
}

#[tokio::test]
async fn discard_keeps_the_attempt_resumable() {
    let repo = seeded_repo();
    let svc = loop_service(&repo);

    let mut session = svc.start_session(TEST).await.unwrap();
    let attempt_id = session.attempt_id();
    session.answer(AnswerInput::Select(OptionId::new(2))).unwrap();
    let outcome = svc.exit(&mut session, ExitChoice::Discard).await.unwrap();
    assert_eq!(outcome, ExitOutcome::Discarded);
    assert_eq!(session.status(), SessionStatus::Discarded);
    assert!(matches!(
        svc.save_progress(&mut session).await,
        Err(SessionError::Closed)
    ));

    let next = svc.start_session(TEST).await.unwrap();
    assert_eq!(next.attempt_id(), attempt_id);
    assert!(next.answers().is_empty());
    assert_eq!(next.position(), 0);
}

#[tokio::test]
async fn stale_token_starts_a_new_attempt() {
    let repo = seeded_repo();
    repo.put_token(TEST, AttemptId::new(999)).await.unwrap();
    let svc = loop_service(&repo);

    let session = svc.start_session(TEST).await.unwrap();
    assert_ne!(session.attempt_id(), AttemptId::new(999));
    assert!(!session.is_resumed());
    assert_eq!(
        repo.get_token(TEST).await.unwrap(),
        Some(session.attempt_id())
    );
}

#[tokio::test]
async fn answers_for_removed_questions_are_skipped_on_resume() {
    let repo = seeded_repo();
    let svc = loop_service(&repo);

    let mut session = svc.start_session(TEST).await.unwrap();
    session.answer(AnswerInput::Select(OptionId::new(2))).unwrap();
    session.jump_to(1).unwrap();
    session.answer(AnswerInput::Toggle(OptionId::new(4))).unwrap();
    svc.save_progress(&mut session).await.unwrap();

    // the second question is withdrawn between sessions
    let mut questions = build_questions();
    questions.remove(1);
    repo.put_questions(TEST, questions).unwrap();

    let resumed = svc.start_session(TEST).await.unwrap();
    assert_eq!(resumed.questions().len(), 3);
    assert_eq!(resumed.answers().len(), 1);
    assert_eq!(resumed.answers().get(0).unwrap().values, vec![2]);
    assert_eq!(resumed.position(), 0);
}

#[tokio::test]
async fn explicit_resume_reads_saved_answers() {
    let repo = seeded_repo();
    let svc = loop_service(&repo);
    let attempt_id = repo.start_attempt(TEST).await.unwrap();
    repo.save_progress(&ProgressPayload {
        attempt_id,
        test_id: TEST,
        progress: 4,
        answers: vec![
            FlatAnswer {
                question_id: QuestionId::new(30),
                option_ids: vec![6],
                score: Some(vec![55]),
            },
            FlatAnswer {
                question_id: QuestionId::new(10),
                option_ids: vec![1],
                score: None,
            },
        ],
    })
    .await
    .unwrap();

    let session = svc.resume_session(TEST, attempt_id).await.unwrap();
    assert_eq!(session.position(), 2);
    assert_eq!(session.answers().get(2).unwrap().values, vec![55]);
    assert_eq!(session.progress().answered, 2);
    assert_eq!(repo.get_token(TEST).await.unwrap(), Some(attempt_id));
}

#[tokio::test]
async fn unknown_test_fails_to_load() {
    let repo = InMemoryRepository::new();
    let svc = loop_service(&repo);
    let err = svc.start_session(TestId::new(42)).await.unwrap_err();
    assert!(err.is_fatal());
    assert!(matches!(
        err,
        SessionError::Load(
            LoadError::StartAttempt(StorageError::NotFound)
                | LoadError::Questions(StorageError::NotFound)
        )
    ));
}

#[tokio::test]
async fn test_without_questions_is_empty() {
    let repo = InMemoryRepository::new();
    repo.put_questions(TEST, Vec::new()).unwrap();
    let svc = loop_service(&repo);
    let err = svc.start_session(TEST).await.unwrap_err();
    assert!(matches!(err, SessionError::Empty));
}

async fn answer_all(svc: &AssessmentLoopService, session: &mut AssessmentSession) {
    session.answer(AnswerInput::Select(OptionId::new(1))).unwrap();
    svc.advance(session).await.unwrap();
    session.answer(AnswerInput::Toggle(OptionId::new(3))).unwrap();
    svc.advance(session).await.unwrap();
    session.answer(AnswerInput::Slider(40)).unwrap();
    svc.advance(session).await.unwrap();
    session.answer(AnswerInput::Allocate(vec![50, 50])).unwrap();
}

#[tokio::test]
async fn submitted_attempt_behind_a_surviving_token_is_not_resumed() {
    let repo = seeded_repo();
    let svc = AssessmentLoopService::new(
        Clock::fixed(fixed_now()),
        Arc::new(repo.clone()),
        Arc::new(repo.clone()),
        Arc::new(repo.clone()),
        Arc::new(StickyTokens {
            inner: repo.clone(),
        }),
    );

    let mut first = svc.start_session(TEST).await.unwrap();
    let submitted_id = first.attempt_id();
    answer_all(&svc, &mut first).await;
    assert_eq!(svc.advance(&mut first).await.unwrap(), AdvanceOutcome::Submitted);
    assert_eq!(repo.get_token(TEST).await.unwrap(), Some(submitted_id));

    let mut second = svc.start_session(TEST).await.unwrap();
    assert_ne!(second.attempt_id(), submitted_id);
    assert!(!second.is_resumed());
    assert!(second.answers().is_empty());
    assert_eq!(repo.get_token(TEST).await.unwrap(), Some(second.attempt_id()));

    answer_all(&svc, &mut second).await;
    svc.save_progress(&mut second).await.unwrap();
    assert_eq!(svc.advance(&mut second).await.unwrap(), AdvanceOutcome::Submitted);
    assert_eq!(repo.submissions().unwrap().len(), 2);
}

#[tokio::test]
async fn explicit_resume_of_submitted_attempt_fails_to_load() {
    let repo = seeded_repo();
    let svc = loop_service(&repo);

    let mut session = svc.start_session(TEST).await.unwrap();
    let attempt_id = session.attempt_id();
    answer_all(&svc, &mut session).await;
    assert_eq!(svc.advance(&mut session).await.unwrap(), AdvanceOutcome::Submitted);

    let err = svc.resume_session(TEST, attempt_id).await.unwrap_err();
    assert!(err.is_fatal());
    assert!(matches!(
        err,
        SessionError::Load(LoadError::PriorSubmission(StorageError::Conflict))
    ));
}

#[tokio::test]
async fn unreadable_progress_aborts_load_and_keeps_token() {
    let repo = seeded_repo();
    let attempt_id = repo.start_attempt(TEST).await.unwrap();
    repo.put_token(TEST, attempt_id).await.unwrap();
    let svc = AssessmentLoopService::new(
        Clock::fixed(fixed_now()),
        Arc::new(repo.clone()),
        Arc::new(UnreadableProgress {
            inner: repo.clone(),
        }),
        Arc::new(repo.clone()),
        Arc::new(repo.clone()),
    );

    let err = svc.start_session(TEST).await.unwrap_err();
    assert!(err.is_fatal());
    assert!(matches!(
        err,
        SessionError::Load(LoadError::PriorSubmission(StorageError::Connection(_)))
    ));
    assert_eq!(repo.get_token(TEST).await.unwrap(), Some(attempt_id));
}

//! Rebuilds in-memory answers from a previously persisted submission.

use crate::answer_store::AnswerStore;
use crate::model::{AnswerRecord, OptionId, Question, QuestionId};
use crate::submission::FlatAnswer;

/// A persisted answer that could not be placed on the loaded question set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumeMismatch {
    pub question_id: QuestionId,
}

/// Result of reconciling a prior submission with the loaded questions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub answers: AnswerStore,
    /// Furthest position reached (0 when nothing matched).
    pub position: usize,
    /// Answers skipped because their question is no longer in the set or
    /// they name options the question does not have.
    pub mismatches: Vec<ResumeMismatch>,
}

/// Place each persisted answer at the position of its question.
///
/// Slider and percentage answers take their values from `score` when present.
/// The resume position is the furthest answered position, not the first gap,
/// so the user can still revisit earlier questions. Answers for unknown
/// questions, or choice answers naming an option the question no longer has,
/// are skipped and reported in `mismatches`; a later entry for the same
/// question replaces an earlier one.
#[must_use]
pub fn reconcile(prior: &[FlatAnswer], questions: &[Question]) -> Reconciliation {
    let mut answers = AnswerStore::new(questions.len());
    let mut mismatches = Vec::new();
    let mut furthest = 0_usize;

    for answer in prior {
        let Some(position) = questions.iter().position(|q| q.id == answer.question_id) else {
            mismatches.push(ResumeMismatch {
                question_id: answer.question_id,
            });
            continue;
        };
        let question = &questions[position];

        let values = match &answer.score {
            Some(score) if question.question_type.carries_score() => score.clone(),
            _ => answer.option_ids.clone(),
        };
        if question.question_type.values_are_option_ids()
            && !values.iter().all(|id| question.has_option(OptionId::new(*id)))
        {
            mismatches.push(ResumeMismatch {
                question_id: answer.question_id,
            });
            continue;
        }
        let record = AnswerRecord::new(question.question_type, question.id, values);

        // The record is built from the question itself, so `set` cannot reject it.
        if answers.set(questions, position, record).is_ok() {
            furthest = furthest.max(position);
        } else {
            mismatches.push(ResumeMismatch {
                question_id: answer.question_id,
            });
        }
    }

    Reconciliation {
        answers,
        position: furthest,
        mismatches,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AttemptId, QuestionOption, QuestionType};
    use crate::submission::final_payload;

    fn question(id: u64, ty: QuestionType, options: &[u64]) -> Question {
        Question::new(
            QuestionId::new(id),
            ty,
            "?",
            options
                .iter()
                .map(|opt| QuestionOption::new(OptionId::new(*opt), "o"))
                .collect(),
        )
        .unwrap()
    }

    fn flat(question_id: u64, option_ids: &[u64], score: Option<&[u64]>) -> FlatAnswer {
        FlatAnswer {
            question_id: QuestionId::new(question_id),
            option_ids: option_ids.to_vec(),
            score: score.map(<[u64]>::to_vec),
        }
    }

    fn nine_single_choice() -> Vec<Question> {
        (1..=9)
            .map(|id| question(id * 100, QuestionType::SingleChoice, &[1, 2]))
            .collect()
    }

    #[test]
    fn resume_over_first_four_positions() {
        let questions = nine_single_choice();
        let prior: Vec<_> = (1..=4).map(|id| flat(id * 100, &[2], None)).collect();

        let result = reconcile(&prior, &questions);

        assert_eq!(result.position, 3);
        for pos in 0..=3 {
            assert_eq!(result.answers.get(pos).unwrap().values, vec![2]);
        }
        for pos in 4..9 {
            assert!(result.answers.get(pos).is_none());
        }
        assert!(result.mismatches.is_empty());
    }

    #[test]
    fn position_is_furthest_reached_not_first_gap() {
        let questions = nine_single_choice();
        let prior = vec![flat(100, &[1], None), flat(700, &[2], None)];
        let result = reconcile(&prior, &questions);
        assert_eq!(result.position, 6);
        assert!(result.answers.get(3).is_none());
    }

    #[test]
    fn empty_prior_starts_at_zero() {
        let questions = nine_single_choice();
        let result = reconcile(&[], &questions);
        assert_eq!(result.position, 0);
        assert!(result.answers.is_empty());
    }

    #[test]
    fn numeric_types_prefer_score() {
        let questions = vec![
            question(1, QuestionType::Percentage, &[11, 12]),
            question(2, QuestionType::Slider, &[21]),
            question(3, QuestionType::SingleChoice, &[31, 32]),
        ];
        let prior = vec![
            flat(1, &[11, 12], Some(&[30, 70])),
            flat(2, &[21], Some(&[80])),
            flat(3, &[32], Some(&[5])),
        ];
        let result = reconcile(&prior, &questions);
        assert_eq!(result.answers.get(0).unwrap().values, vec![30, 70]);
        assert_eq!(result.answers.get(1).unwrap().values, vec![80]);
        // score is ignored for choice types
        assert_eq!(result.answers.get(2).unwrap().values, vec![32]);
    }

    #[test]
    fn numeric_type_without_score_falls_back_to_option_ids() {
        let questions = vec![question(1, QuestionType::Percentage, &[11, 12])];
        let result = reconcile(&[flat(1, &[50, 50], None)], &questions);
        assert_eq!(result.answers.get(0).unwrap().values, vec![50, 50]);
    }

    #[test]
    fn unknown_questions_are_skipped_and_reported() {
        let questions = nine_single_choice();
        let prior = vec![flat(100, &[1], None), flat(4242, &[1], None)];
        let result = reconcile(&prior, &questions);
        assert_eq!(result.answers.len(), 1);
        assert_eq!(result.position, 0);
        assert_eq!(
            result.mismatches,
            vec![ResumeMismatch {
                question_id: QuestionId::new(4242)
            }]
        );
    }

    #[test]
    fn choice_answers_with_foreign_option_ids_are_dropped() {
        let questions = vec![
            question(1, QuestionType::SingleChoice, &[1, 2]),
            question(2, QuestionType::Ranking, &[1, 2, 3]),
            question(3, QuestionType::Color, &[1]),
        ];
        let prior = vec![
            flat(1, &[99], None),
            flat(2, &[3, 7], None),
            flat(3, &[14, 27], None),
        ];
        let result = reconcile(&prior, &questions);

        assert!(result.answers.get(0).is_none());
        assert!(result.answers.get(1).is_none());
        // color picks are palette coordinates, not option ids
        assert_eq!(result.answers.get(2).unwrap().values, vec![14, 27]);
        assert_eq!(result.position, 2);
        assert_eq!(
            result.mismatches,
            vec![
                ResumeMismatch {
                    question_id: QuestionId::new(1)
                },
                ResumeMismatch {
                    question_id: QuestionId::new(2)
                },
            ]
        );
        assert!(final_payload(AttemptId::new(1), &questions, &result.answers).is_err());
    }

    #[test]
    fn final_payload_round_trips_through_reconcile() {
        let questions = vec![
            question(1, QuestionType::SingleChoice, &[1, 2]),
            question(2, QuestionType::MultiChoice, &[1, 2, 3]),
            question(3, QuestionType::Slider, &[1]),
            question(4, QuestionType::Ranking, &[1, 2, 3]),
            question(5, QuestionType::SingleEmotion, &[1, 2]),
            question(6, QuestionType::Emotion, &[1, 2]),
            question(7, QuestionType::Percentage, &[1, 2, 3]),
            question(8, QuestionType::Color, &[1]),
            question(9, QuestionType::ImageChoice, &[1, 2]),
            question(10, QuestionType::ImageCaptionChoice, &[1, 2]),
        ];
        let values: [&[u64]; 10] = [
            &[2],
            &[3, 1],
            &[60],
            &[3, 1, 2],
            &[1],
            &[2],
            &[20, 30, 50],
            &[14, 27],
            &[1],
            &[2],
        ];
        let mut store = AnswerStore::new(questions.len());
        for (pos, vals) in values.iter().enumerate() {
            let q = &questions[pos];
            store
                .set(&questions, pos, AnswerRecord::new(q.question_type, q.id, vals.to_vec()))
                .unwrap();
        }

        let payload = final_payload(AttemptId::new(1), &questions, &store).unwrap();
        let result = reconcile(&payload.answers, &questions);

        assert_eq!(result.answers, store);
        assert_eq!(result.position, questions.len() - 1);
    }
}

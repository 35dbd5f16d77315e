pub mod assignment;
pub mod attempt;
pub mod chat_message;
pub mod course;
pub mod enrolment;
pub mod feedback;
pub mod grade;
pub mod material;
pub mod notification;
pub mod quiz_answer_choice;
pub mod quiz_question;
pub mod status;
pub mod student_answer;
pub mod student_file_submission;
pub mod student_text_answer;
pub mod user;
pub mod user_profile;

#[allow(unused_imports)]
pub mod prelude {
    pub use super::assignment::{self, AssignmentKind, Entity as Assignment};
    pub use super::attempt::{self, Entity as Attempt};
    pub use super::chat_message::{self, Entity as ChatMessage};
    pub use super::course::{self, Entity as Course};
    pub use super::enrolment::{self, Entity as Enrolment};
    pub use super::feedback::{self, Entity as Feedback};
    pub use super::grade::{self, Entity as Grade};
    pub use super::material::{self, Entity as Material};
    pub use super::notification::{self, Entity as Notification, NotificationKind};
    pub use super::quiz_answer_choice::{self, Entity as QuizAnswerChoice};
    pub use super::quiz_question::{self, Entity as QuizQuestion};
    pub use super::status::{self, Entity as Status};
    pub use super::student_answer::{self, Entity as StudentAnswer};
    pub use super::student_file_submission::{self, Entity as StudentFileSubmission};
    pub use super::student_text_answer::{self, Entity as StudentTextAnswer};
    pub use super::user::{self, Entity as User};
    pub use super::user_profile::{self, Entity as UserProfile, Role};
}

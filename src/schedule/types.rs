use crate::config::Config;

/// Type of scheduled task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleType {
    VerificationPass,
    RoleSync,
    VoiceReconcile,
}

/// A scheduled task configuration
#[derive(Debug, Clone)]
pub struct Schedule {
    pub schedule_type: ScheduleType,
    pub cron: cron::Schedule,
}

impl Schedule {
    /// All background jobs, with the cron expressions from configuration
    pub fn from_config(config: &Config) -> Vec<Schedule> {
        vec![
            Schedule {
                schedule_type: ScheduleType::VerificationPass,
                cron: config.verification_cron.clone(),
            },
            Schedule {
                schedule_type: ScheduleType::RoleSync,
                cron: config.role_sync_cron.clone(),
            },
            Schedule {
                schedule_type: ScheduleType::VoiceReconcile,
                cron: config.voice_reconcile_cron.clone(),
            },
        ]
    }
}

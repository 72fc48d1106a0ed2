pub mod shared {
    pub mod constants;
    pub mod frame;
    pub mod region;
    pub mod video_metadata;
}

pub mod video {
    pub mod domain {
        pub mod video_reader;
        pub mod video_writer;
    }
    pub mod infrastructure {
        pub mod ffmpeg_reader;
        pub mod ffmpeg_writer;
    }
}

pub mod validity {
    pub mod domain {
        pub mod face_detector;
        pub mod frame_check;
        pub mod validity_oracle;
        pub mod verdict;
    }
    pub mod infrastructure;
}

pub mod audio {
    pub mod domain {
        pub mod audio_splicer;
        pub mod time_range;
    }
    pub mod infrastructure {
        pub mod ffmpeg_cli_splicer;
    }
}

pub mod segmentation {
    pub mod domain {
        pub mod fragment_naming;
        pub mod fragment_state;
        pub mod pending_buffer;
        pub mod segmentation_policy;
    }
    pub mod infrastructure {
        pub mod fragment_finalizer;
        pub mod fragment_writer;
    }
}

pub mod pipeline {
    pub mod extract_fragments_use_case;
    pub mod extraction_config;
    pub mod process_batch_use_case;
    pub mod progress_reporter;
    pub mod resource_guard;
}
